use std::collections::HashMap;
use std::fmt::Debug;

use async_lock::RwLock;
use async_trait::async_trait;
use tracing::debug;

use interoperator_metadata::{DynamicObject, SharedClient};
use interoperator_metadata::builtin::secret_data;

use super::RegistryError;

/// secret entry holding the connection material
pub const CLUSTER_SECRET_KEY: &str = "cluster";

/// turns a cluster credential secret into a client
#[async_trait]
pub trait ClientFactory: Send + Sync + Debug {
    async fn connect(
        &self,
        cluster_id: &str,
        secret: &DynamicObject,
    ) -> Result<SharedClient, RegistryError>;
}

/// connects to clusters living in this process.
/// The `cluster` entry of the secret names the endpoint registered with `add`.
#[derive(Debug, Default)]
pub struct LocalClientFactory {
    endpoints: RwLock<HashMap<String, SharedClient>>,
}

impl LocalClientFactory {
    pub async fn add(&self, endpoint: impl Into<String>, client: SharedClient) {
        let mut write = self.endpoints.write().await;
        write.insert(endpoint.into(), client);
    }
}

#[async_trait]
impl ClientFactory for LocalClientFactory {
    async fn connect(
        &self,
        cluster_id: &str,
        secret: &DynamicObject,
    ) -> Result<SharedClient, RegistryError> {
        let endpoint = secret_data(secret, CLUSTER_SECRET_KEY)
            .and_then(|raw| String::from_utf8(raw).ok())
            .ok_or_else(|| {
                RegistryError::not_found(
                    cluster_id,
                    format!("secret {} has no {CLUSTER_SECRET_KEY} entry", secret.name()),
                )
            })?;

        let read = self.endpoints.read().await;
        let client = read.get(endpoint.trim()).cloned().ok_or_else(|| {
            RegistryError::not_found(cluster_id, format!("unknown endpoint {endpoint}"))
        })?;
        debug!(cluster_id, endpoint, "connected");
        Ok(client)
    }
}
