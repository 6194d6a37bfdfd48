//!
//! # Instance controller
//!
//! Drives service instances owned by this cluster through their life cycle:
//! pending requests are turned into infrastructure, the rendered status is
//! copied back and deletions tear everything down before the finalizer goes.
//!

mod error_handler;

pub use error_handler::handle_error;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, trace};

use interoperator_metadata::{ObjectKey, ResourceClient, ResourceRef, SharedClient};
use interoperator_metadata::constants::FINALIZER_NAME;
use interoperator_metadata::instance::{
    InstanceState, LastOperation, ServiceInstance, ServiceInstanceSpec,
};

use crate::ReconcileError;
use crate::resources::{
    DEPROVISION_ACTION, OperationStatus, PROVISION_ACTION, ResourceManager, ResourceRequest,
};
use crate::runtime::{Action, Reconciler, RetryPolicy, retry};

pub const INSTANCE_CONTROLLER: &str = "instance";

#[derive(Debug)]
pub struct InstanceReconciler {
    client: SharedClient,
    resources: Arc<dyn ResourceManager>,
    own_cluster_id: String,
    retry: RetryPolicy,
}

fn request<'a>(instance: &'a ServiceInstance, action: &'a str) -> ResourceRequest<'a> {
    ResourceRequest {
        instance_id: instance.name(),
        binding_id: "",
        service_id: &instance.spec.service_id,
        plan_id: &instance.spec.plan_id,
        action,
        namespace: instance.namespace(),
    }
}

fn parse_state(computed: &str) -> Result<InstanceState, ReconcileError> {
    computed
        .parse()
        .map_err(|_| ReconcileError::InvalidStatus(format!("state {computed:?}")))
}

impl InstanceReconciler {
    pub fn new(
        client: SharedClient,
        resources: Arc<dyn ResourceManager>,
        own_cluster_id: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            resources,
            own_cluster_id: own_cluster_id.into(),
            retry,
        }
    }

    async fn fetch(&self, key: &ObjectKey) -> Result<Option<ServiceInstance>, ReconcileError> {
        Ok(self.client.get_obj_opt::<ServiceInstanceSpec>(key).await?)
    }

    async fn ensure_finalizer(&self, key: &ObjectKey) -> Result<(), ReconcileError> {
        let Some(mut instance) = self.fetch(key).await? else {
            return Ok(());
        };
        if instance.metadata.is_being_deleted() || !instance.metadata.add_finalizer(FINALIZER_NAME)
        {
            return Ok(());
        }
        self.client.update_obj(instance).await?;
        debug!(%key, "finalizer added");
        Ok(())
    }

    async fn set_in_progress(
        &self,
        key: &ObjectKey,
        operation: LastOperation,
        resources: &[ResourceRef],
    ) -> Result<(), ReconcileError> {
        let Some(mut instance) = self.fetch(key).await? else {
            return Ok(());
        };
        instance.set_state(InstanceState::InProgress);
        instance.set_last_operation(operation);
        instance.status.resources = resources.to_vec();
        self.client.update_obj(instance).await?;
        info!(%key, %operation, "in progress");
        Ok(())
    }

    async fn provision(
        &self,
        instance: &ServiceInstance,
    ) -> Result<Vec<ResourceRef>, ReconcileError> {
        let mut expected = self
            .resources
            .compute_expected_resources(self.client.as_ref(), request(instance, PROVISION_ACTION))
            .await?;
        let owner = instance.clone().into_dynamic()?;
        self.resources.set_owner_reference(&owner, &mut expected);
        Ok(self
            .resources
            .reconcile_resources(self.client.as_ref(), expected, &instance.status.resources)
            .await?)
    }

    /// copy the provision status rendered from the live resources
    async fn update_status(&self, key: &ObjectKey) -> Result<(), ReconcileError> {
        let Some(instance) = self.fetch(key).await? else {
            return Ok(());
        };
        let status = self
            .resources
            .compute_status(
                self.client.as_ref(),
                self.client.as_ref(),
                request(&instance, PROVISION_ACTION),
            )
            .await?
            .provision;
        let state = parse_state(&status.state)?;

        retry(self.retry, "update status", || self.write_status(key, state, &status)).await
    }

    async fn write_status(
        &self,
        key: &ObjectKey,
        state: InstanceState,
        status: &OperationStatus,
    ) -> Result<(), ReconcileError> {
        let Some(mut instance) = self.fetch(key).await? else {
            return Ok(());
        };
        let before = instance.status.clone();
        instance.set_state(state);
        instance.status.error = status.error.clone();
        instance.status.description = status.response.clone();
        instance.status.dashboard_url = status.dashboard_url.clone();
        if instance.status == before {
            trace!(%key, "status unchanged");
            return Ok(());
        }
        self.client.update_obj(instance).await?;
        debug!(%key, %state, "status updated");
        Ok(())
    }

    /// follow a deletion until every tracked resource is gone
    async fn update_deprovision_status(&self, key: &ObjectKey) -> Result<(), ReconcileError> {
        let Some(instance) = self.fetch(key).await? else {
            return Ok(());
        };
        let status = match self
            .resources
            .compute_status(
                self.client.as_ref(),
                self.client.as_ref(),
                request(&instance, DEPROVISION_ACTION),
            )
            .await
        {
            Ok(status) => status.deprovision,
            // sources already deleted
            Err(err) if err.is_not_found() => OperationStatus {
                state: instance.status.state.clone(),
                error: err.to_string(),
                ..Default::default()
            },
            Err(err) => return Err(err.into()),
        };
        let state = if status.state.is_empty() {
            None
        } else {
            Some(parse_state(&status.state)?)
        };

        retry(self.retry, "update deprovision status", || {
            self.write_deprovision_status(key, state, &status)
        })
        .await
    }

    async fn write_deprovision_status(
        &self,
        key: &ObjectKey,
        state: Option<InstanceState>,
        status: &OperationStatus,
    ) -> Result<(), ReconcileError> {
        let Some(mut instance) = self.fetch(key).await? else {
            return Ok(());
        };
        let before = instance.clone();

        let mut remaining = vec![];
        for resource in &instance.status.resources {
            if self
                .client
                .get_opt(&resource.type_meta(), &resource.key())
                .await?
                .is_some()
            {
                remaining.push(resource.clone());
            }
        }
        instance.status.resources = remaining;

        if state == Some(InstanceState::Succeeded) || instance.status.resources.is_empty() {
            instance.metadata.remove_finalizer(FINALIZER_NAME);
            instance.set_state(InstanceState::Succeeded);
            info!(%key, "deprovisioned");
        } else {
            if let Some(state) = state {
                instance.set_state(state);
            }
            instance.status.error = status.error.clone();
            instance.status.description = status.response.clone();
        }

        if instance == before {
            return Ok(());
        }
        self.client.update_obj(instance).await?;
        Ok(())
    }

    /// one pass of the state machine over an instance owned by this cluster
    async fn reconcile_instance(
        &self,
        key: &ObjectKey,
        state: InstanceState,
    ) -> Result<Action, ReconcileError> {
        retry(self.retry, "add finalizer", || self.ensure_finalizer(key)).await?;

        let Some(instance) = self.fetch(key).await? else {
            return Ok(Action::Await);
        };

        if state == InstanceState::Delete && instance.metadata.is_being_deleted() {
            let remaining = self
                .resources
                .delete_sub_resources(self.client.as_ref(), &instance.status.resources)
                .await?;
            retry(self.retry, "set in progress", || {
                self.set_in_progress(key, LastOperation::Delete, &remaining)
            })
            .await?;
        } else if let Some(operation @ (LastOperation::InQueue | LastOperation::Update)) =
            state.operation()
        {
            let resources = self.provision(&instance).await?;
            retry(self.retry, "set in progress", || {
                self.set_in_progress(key, operation, &resources)
            })
            .await?;
        }

        let Some(instance) = self.fetch(key).await? else {
            return Ok(Action::Await);
        };
        if instance.state()? != InstanceState::InProgress {
            return Ok(Action::Await);
        }
        match instance.last_operation()? {
            LastOperation::Delete => self.update_deprovision_status(key).await?,
            _ => self.update_status(key).await?,
        }
        Ok(Action::Await)
    }
}

#[async_trait]
impl Reconciler for InstanceReconciler {
    type Error = ReconcileError;

    #[instrument(skip(self), fields(%key))]
    async fn reconcile(&self, key: &ObjectKey) -> Result<Action, ReconcileError> {
        let Some(instance) = self.fetch(key).await? else {
            trace!("instance gone");
            return Ok(Action::Await);
        };

        match instance.cluster_id() {
            Some(cluster_id) if cluster_id == self.own_cluster_id => {}
            other => {
                trace!(cluster_id = ?other, "not owned by this cluster");
                return Ok(Action::Await);
            }
        }

        let state = match instance.state() {
            Ok(state) => state,
            Err(err) => {
                debug!(%err, "ignoring instance");
                return Ok(Action::Await);
            }
        };
        if state.is_terminal() {
            return Ok(Action::Await);
        }

        let last_operation = state
            .operation()
            .or_else(|| instance.last_operation().ok())
            .unwrap_or(LastOperation::InQueue);

        let outcome = self.reconcile_instance(key, state).await;
        handle_error(self.client.as_ref(), key, last_operation, outcome, self.retry).await
    }
}
