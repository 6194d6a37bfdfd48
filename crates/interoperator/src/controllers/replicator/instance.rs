use async_trait::async_trait;
use tracing::{debug, info, instrument, trace};

use interoperator_metadata::{ObjectKey, ObjectMeta, ResourceClient, SharedClient, Spec};
use interoperator_metadata::builtin::{namespace, namespace_type};
use interoperator_metadata::constants::FINALIZER_NAME;
use interoperator_metadata::instance::{
    InstanceState, LastOperation, ServiceInstance, ServiceInstanceSpec,
};

use crate::ReconcileError;
use crate::registry::SharedRegistry;
use crate::runtime::{Action, Reconciler, RetryPolicy, retry};

/// overwrite the replicated portion of `to` with the one of `from`
fn copy_object(from: &ServiceInstance, to: &mut ServiceInstance) {
    to.metadata.labels = from.metadata.labels.clone();
    to.metadata.annotations = from.metadata.annotations.clone();
    to.spec = from.spec.clone();
    to.status = from.status.clone();
}

fn same_content(a: &ServiceInstance, b: &ServiceInstance) -> bool {
    a.metadata.labels == b.metadata.labels
        && a.metadata.annotations == b.metadata.annotations
        && a.spec == b.spec
        && a.status == b.status
}

/// hands instances placed on sister clusters over to them and mirrors
/// their progress back into the master copy
#[derive(Debug)]
pub struct InstanceReplicator {
    master: SharedClient,
    registry: SharedRegistry,
    retry: RetryPolicy,
}

impl InstanceReplicator {
    pub fn new(master: SharedClient, registry: SharedRegistry, retry: RetryPolicy) -> Self {
        Self {
            master,
            registry,
            retry,
        }
    }

    /// namespace of the instance exists in target unless the instance is going away
    async fn reconcile_namespace(
        &self,
        target: &SharedClient,
        name: &str,
        delete: bool,
    ) -> Result<(), ReconcileError> {
        let key = ObjectKey::new("", name);
        let exists = target.get_opt(&namespace_type(), &key).await?.is_some();
        match (exists, delete) {
            (false, false) => {
                match target.create(namespace(name)).await {
                    Err(err) if !err.is_already_exists() => return Err(err.into()),
                    _ => info!(namespace = name, "namespace created in target"),
                }
            }
            (true, true) => match target.delete(&namespace_type(), &key).await {
                // deletion already under way
                Err(err) if err.is_conflict() || err.is_not_found() => {}
                Err(err) => return Err(err.into()),
                Ok(()) => debug!(namespace = name, "namespace deleted in target"),
            },
            _ => {}
        }
        Ok(())
    }

    /// create or overwrite the replica from the master copy
    async fn copy_down(
        &self,
        target: &SharedClient,
        instance: &ServiceInstance,
    ) -> Result<(), ReconcileError> {
        let key = instance.metadata.key();
        match target.get_obj_opt::<ServiceInstanceSpec>(&key).await? {
            None if instance.metadata.is_being_deleted() => {
                trace!(%key, "replica already gone");
            }
            None => {
                let mut replica = ServiceInstance::new(
                    ObjectMeta::new(&key.name, &key.namespace),
                    ServiceInstanceSpec::default(),
                );
                copy_object(instance, &mut replica);
                target.create_obj(replica).await?;
                debug!(%key, "replica created");
            }
            Some(mut replica) => {
                if same_content(instance, &replica) {
                    return Ok(());
                }
                copy_object(instance, &mut replica);
                target.update_obj(replica).await?;
                debug!(%key, "replica updated");
            }
        }
        Ok(())
    }

    /// master copy `in progress`, the operation it was in is kept as last operation
    async fn set_in_progress(&self, key: &ObjectKey) -> Result<(), ReconcileError> {
        let Some(mut instance) = self.master.get_obj_opt::<ServiceInstanceSpec>(key).await? else {
            return Ok(());
        };
        let Some(operation) = instance.state()?.operation() else {
            return Ok(());
        };
        instance.set_state(InstanceState::InProgress);
        instance.set_last_operation(operation);
        self.master.update_obj(instance).await?;
        info!(%key, %operation, "master copy in progress");
        Ok(())
    }

    /// mirror the replica back into the master copy
    async fn copy_up(
        &self,
        target: &SharedClient,
        key: &ObjectKey,
    ) -> Result<(), ReconcileError> {
        let Some(mut instance) = self.master.get_obj_opt::<ServiceInstanceSpec>(key).await? else {
            return Ok(());
        };
        if instance.state()? != InstanceState::InProgress {
            return Ok(());
        }

        match target.get_obj_opt::<ServiceInstanceSpec>(key).await? {
            None => {
                if instance.last_operation()? != LastOperation::Delete {
                    return Err(ReconcileError::Other(format!("replica of {key} missing")));
                }
                instance.set_state(InstanceState::Succeeded);
                instance.metadata.remove_finalizer(FINALIZER_NAME);
                info!(%key, "replica deleted");
            }
            Some(replica) => {
                if replica.state().is_ok_and(|state| state.is_pending()) {
                    trace!(%key, "replica not picked up yet");
                    return Ok(());
                }
                if same_content(&replica, &instance) {
                    return Ok(());
                }
                copy_object(&replica, &mut instance);
            }
        }
        self.master.update_obj(instance).await?;
        debug!(%key, "master copy updated");
        Ok(())
    }
}

#[async_trait]
impl Reconciler for InstanceReplicator {
    type Error = ReconcileError;

    #[instrument(skip(self), fields(%key))]
    async fn reconcile(&self, key: &ObjectKey) -> Result<Action, ReconcileError> {
        let Some(instance) = self.master.get_obj_opt::<ServiceInstanceSpec>(key).await? else {
            return Ok(Action::Await);
        };
        let Some(cluster_id) = instance.cluster_id() else {
            trace!("no cluster id");
            return Ok(Action::Await);
        };
        if cluster_id == self.registry.master_id() {
            return Ok(Action::Await);
        }
        let state = match instance.state() {
            Ok(state) => state,
            Err(err) => {
                debug!(%err, "ignoring instance");
                return Ok(Action::Await);
            }
        };

        let target = self.registry.get_client(cluster_id).await?;
        let deleting = instance.metadata.is_being_deleted();
        self.reconcile_namespace(&target, instance.namespace(), deleting)
            .await?;

        if deleting && state == InstanceState::Delete {
            target
                .delete_if_exists(&ServiceInstanceSpec::type_meta(), key)
                .await?;
        }

        if state.is_pending() {
            self.copy_down(&target, &instance).await?;
            retry(self.retry, "set in progress", || self.set_in_progress(key)).await?;
        }

        self.copy_up(&target, key).await?;
        Ok(Action::Await)
    }
}
