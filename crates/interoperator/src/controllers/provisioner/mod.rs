//!
//! # Provisioner controller
//!
//! Bootstraps every registered sister cluster: custom resource definitions,
//! namespace, cluster record and credentials, the interoperator deployment and
//! its permissions. Bootstrapped clusters are handed to the watch bridge.
//!

mod deployment;

pub use deployment::{DeploymentProvisioner, Provisioner};

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use tracing::{debug, info, instrument};

use interoperator_metadata::{
    DynamicObject, ObjectKey, ObjectMeta, ResourceClient, SharedClient, Spec, WatchEvent,
};
use interoperator_metadata::builtin::{
    cluster_role_binding, custom_resource_definition, namespace, secret_type, set_deployment_env,
};
use interoperator_metadata::catalog::{PlanSpec, ServiceSpec};
use interoperator_metadata::cluster::{Cluster, ClusterSpec};
use interoperator_metadata::constants::{
    FINALIZER_NAME, OWN_CLUSTER_ID_ENV_KEY, PROVISIONER_CLUSTER_ROLE_BINDING, PROVISIONER_NAME,
};
use interoperator_metadata::instance::{ServiceBindingSpec, ServiceInstanceSpec};

use crate::ReconcileError;
use crate::registry::SharedRegistry;
use crate::resources::apply;
use crate::runtime::{Action, KeyMapper, Reconciler};
use crate::watch::SharedWatchHook;

pub const PROVISIONER_CONTROLLER: &str = "provisioner";

const CLUSTER_ADMIN_ROLE: &str = "cluster-admin";

/// copy of obj suitable for another cluster: server assigned metadata and status dropped
fn portable_copy(obj: &DynamicObject) -> DynamicObject {
    let mut meta = ObjectMeta::new(&obj.metadata.name, &obj.metadata.namespace);
    meta.labels = obj.metadata.labels.clone();
    meta.annotations = obj.metadata.annotations.clone();
    let mut copy = DynamicObject::new(&obj.type_meta(), meta);
    copy.data = obj.data.clone();
    copy.data.remove("status");
    copy
}

fn interoperator_crds() -> Vec<DynamicObject> {
    [
        ServiceInstanceSpec::metadata(),
        ServiceBindingSpec::metadata(),
        ServiceSpec::metadata(),
        PlanSpec::metadata(),
        ClusterSpec::metadata(),
    ]
    .into_iter()
    .map(custom_resource_definition)
    .collect()
}

/// re-enqueue every cluster when the provisioner deployment of the master changes
pub fn deployment_mapper(master: SharedClient, namespace: String) -> KeyMapper {
    Arc::new(move |event: WatchEvent| {
        let master = master.clone();
        let namespace = namespace.clone();
        async move {
            let obj = event.object();
            if obj.name() != PROVISIONER_NAME || obj.namespace() != namespace {
                return vec![];
            }
            master
                .list(&ClusterSpec::type_meta(), Some(&namespace))
                .await
                .map(|clusters| clusters.iter().map(|c| c.metadata.key()).collect())
                .unwrap_or_default()
        }
        .boxed()
    })
}

#[derive(Debug)]
pub struct ProvisionerReconciler {
    master: SharedClient,
    registry: SharedRegistry,
    provisioner: Arc<dyn Provisioner>,
    watch: SharedWatchHook,
    namespace: String,
}

impl ProvisionerReconciler {
    pub fn new(
        master: SharedClient,
        registry: SharedRegistry,
        provisioner: Arc<dyn Provisioner>,
        watch: SharedWatchHook,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            master,
            registry,
            provisioner,
            watch,
            namespace: namespace.into(),
        }
    }

    async fn release(&self, mut cluster: Cluster) -> Result<Action, ReconcileError> {
        let cluster_id = cluster.name().to_owned();
        self.watch.remove_cluster(&cluster_id).await;
        self.registry.evict(&cluster_id).await;
        if cluster.metadata.remove_finalizer(FINALIZER_NAME) {
            self.master.update_obj(cluster).await?;
        }
        info!(cluster_id, "cluster released");
        Ok(Action::Await)
    }

    async fn copy_secret(
        &self,
        target: &SharedClient,
        cluster: &Cluster,
    ) -> Result<(), ReconcileError> {
        if cluster.spec.secret_ref.is_empty() {
            return Ok(());
        }
        let key = ObjectKey::new(cluster.namespace(), &cluster.spec.secret_ref);
        let secret = self.master.get(&secret_type(), &key).await?;
        apply(target.as_ref(), portable_copy(&secret)).await?;
        Ok(())
    }

    async fn copy_deployment(
        &self,
        target: &SharedClient,
        cluster_id: &str,
    ) -> Result<(), ReconcileError> {
        let mut deployment = portable_copy(&self.provisioner.deployment().await?);
        set_deployment_env(&mut deployment, OWN_CLUSTER_ID_ENV_KEY, cluster_id);
        apply(target.as_ref(), deployment).await?;
        Ok(())
    }

    async fn bootstrap(&self, cluster: &Cluster) -> Result<(), ReconcileError> {
        let cluster_id = cluster.name();
        let target = self.registry.get_client(cluster_id).await?;

        for crd in interoperator_crds() {
            apply(target.as_ref(), crd).await?;
        }
        apply(target.as_ref(), namespace(&self.namespace)).await?;

        let mut record = Cluster::new(
            ObjectMeta::new(cluster_id, cluster.namespace()),
            cluster.spec.clone(),
        );
        record.metadata.labels = cluster.metadata.labels.clone();
        apply(target.as_ref(), record.into_dynamic()?).await?;

        self.copy_secret(&target, cluster).await?;
        self.copy_deployment(&target, cluster_id).await?;
        apply(
            target.as_ref(),
            cluster_role_binding(
                PROVISIONER_CLUSTER_ROLE_BINDING,
                CLUSTER_ADMIN_ROLE,
                &self.namespace,
            ),
        )
        .await?;
        debug!(cluster_id, "bootstrapped");

        self.watch.add_cluster(cluster_id).await?;
        Ok(())
    }
}

#[async_trait]
impl Reconciler for ProvisionerReconciler {
    type Error = ReconcileError;

    #[instrument(skip(self), fields(%key))]
    async fn reconcile(&self, key: &ObjectKey) -> Result<Action, ReconcileError> {
        let Some(mut cluster) = self.master.get_obj_opt::<ClusterSpec>(key).await? else {
            return Ok(Action::Await);
        };

        if cluster.metadata.is_being_deleted() {
            return self.release(cluster).await;
        }

        if cluster.metadata.add_finalizer(FINALIZER_NAME) {
            cluster = self.master.update_obj(cluster).await?;
        }

        if cluster.name() == self.registry.master_id() {
            return Ok(Action::Await);
        }

        self.bootstrap(&cluster).await?;
        info!(cluster_id = cluster.name(), "cluster provisioned");
        Ok(Action::Await)
    }
}
