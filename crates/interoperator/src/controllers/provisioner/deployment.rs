use std::fmt::Debug;

use async_trait::async_trait;

use interoperator_metadata::{DynamicObject, ObjectKey, ResourceClient, SharedClient};
use interoperator_metadata::builtin::deployment_type;
use interoperator_metadata::constants::PROVISIONER_NAME;

use crate::ReconcileError;

/// source of the interoperator deployment installed into sister clusters
#[async_trait]
pub trait Provisioner: Send + Sync + Debug {
    async fn deployment(&self) -> Result<DynamicObject, ReconcileError>;
}

/// uses the deployment running in the master cluster
#[derive(Debug)]
pub struct DeploymentProvisioner {
    master: SharedClient,
    key: ObjectKey,
}

impl DeploymentProvisioner {
    pub fn new(master: SharedClient, namespace: &str) -> Self {
        Self {
            master,
            key: ObjectKey::new(namespace, PROVISIONER_NAME),
        }
    }
}

#[async_trait]
impl Provisioner for DeploymentProvisioner {
    async fn deployment(&self) -> Result<DynamicObject, ReconcileError> {
        Ok(self.master.get(&deployment_type(), &self.key).await?)
    }
}
