pub mod instance;
pub mod provisioner;
pub mod replicator;

use std::sync::Arc;

use tracing::warn;

use interoperator_metadata::{ObjectKey, SharedClient, Spec};
use interoperator_metadata::builtin::deployment_type;
use interoperator_metadata::catalog::{PlanSpec, ServiceSpec};
use interoperator_metadata::cluster::ClusterSpec;
use interoperator_metadata::instance::ServiceInstanceSpec;

use crate::config::StartConfig;
use crate::registry::SharedRegistry;
use crate::resources::ResourceManager;
use crate::runtime::{Controller, RequeuePolicy, RetryPolicy, WorkQueue, own_mapper};
use crate::watch::WatchManager;

use self::instance::{INSTANCE_CONTROLLER, InstanceReconciler};
use self::provisioner::{
    DeploymentProvisioner, PROVISIONER_CONTROLLER, ProvisionerReconciler, deployment_mapper,
};
use self::replicator::{
    CatalogReplicator, INSTANCE_REPLICATOR, InstanceReplicator, PLAN_REPLICATOR,
    SERVICE_REPLICATOR, catalog_mapper,
};

/// everything controllers share
#[derive(Debug, Clone)]
pub struct ControllerContext {
    /// cluster this process runs in
    pub client: SharedClient,
    pub registry: SharedRegistry,
    pub watch: Arc<WatchManager>,
    pub resources: Arc<dyn ResourceManager>,
    pub config: StartConfig,
    pub retry: RetryPolicy,
    pub requeue: RequeuePolicy,
}

pub fn start_instance_controller(ctx: &ControllerContext) -> WorkQueue<ObjectKey> {
    let config = &ctx.config.interoperator;
    let reconciler = InstanceReconciler::new(
        ctx.client.clone(),
        ctx.resources.clone(),
        &ctx.config.own_cluster_id,
        ctx.retry,
    );
    let controller = Controller::new(INSTANCE_CONTROLLER, reconciler, config.instance_worker_count)
        .with_requeue(ctx.requeue);

    let ty = ServiceInstanceSpec::type_meta();
    controller.watch_own(ctx.client.clone(), ty.clone(), config.watch_reconnect_delay);
    for owned in &config.instance_controller_watch_list {
        controller.watch_owned(
            ctx.client.clone(),
            owned.clone(),
            ServiceInstanceSpec::kind(),
            config.watch_reconnect_delay,
        );
    }
    controller.resync(ctx.client.clone(), ty, config.resync_interval);
    controller.start()
}

pub fn start_catalog_replicator<S>(ctx: &ControllerContext, name: &str) -> WorkQueue<ObjectKey>
where
    S: Spec + PartialEq,
{
    let config = &ctx.config.interoperator;
    let reconciler = CatalogReplicator::<S>::new(ctx.client.clone(), ctx.registry.clone());
    let controller =
        Controller::new(name, reconciler, config.catalog_worker_count).with_requeue(ctx.requeue);

    controller.watch_own(ctx.client.clone(), S::type_meta(), config.watch_reconnect_delay);
    controller.watch_mapped(
        ctx.client.clone(),
        ClusterSpec::type_meta(),
        catalog_mapper::<S>(ctx.client.clone()),
        config.watch_reconnect_delay,
    );
    controller.resync(ctx.client.clone(), S::type_meta(), config.resync_interval);
    controller.start()
}

pub fn start_instance_replicator(ctx: &ControllerContext) -> WorkQueue<ObjectKey> {
    let config = &ctx.config.interoperator;
    let reconciler = InstanceReplicator::new(ctx.client.clone(), ctx.registry.clone(), ctx.retry);
    let controller = Controller::new(INSTANCE_REPLICATOR, reconciler, config.instance_worker_count)
        .with_requeue(ctx.requeue);

    let ty = ServiceInstanceSpec::type_meta();
    controller.watch_own(ctx.client.clone(), ty.clone(), config.watch_reconnect_delay);
    match ctx.watch.watch_channel(&ty) {
        Some(events) => {
            controller.watch_channel(events, own_mapper());
        }
        None => warn!("sister cluster instances are not bridged"),
    }
    controller.resync(ctx.client.clone(), ty, config.resync_interval);
    controller.start()
}

pub fn start_provisioner(ctx: &ControllerContext) -> WorkQueue<ObjectKey> {
    let config = &ctx.config.interoperator;
    let namespace = &ctx.config.namespace;
    let reconciler = ProvisionerReconciler::new(
        ctx.client.clone(),
        ctx.registry.clone(),
        Arc::new(DeploymentProvisioner::new(ctx.client.clone(), namespace)),
        ctx.watch.clone(),
        namespace.clone(),
    );
    let controller =
        Controller::new(PROVISIONER_CONTROLLER, reconciler, config.cluster_worker_count)
            .with_requeue(ctx.requeue);

    let ty = ClusterSpec::type_meta();
    controller.watch_own(ctx.client.clone(), ty.clone(), config.watch_reconnect_delay);
    controller.watch_mapped(
        ctx.client.clone(),
        deployment_type(),
        deployment_mapper(ctx.client.clone(), namespace.clone()),
        config.watch_reconnect_delay,
    );
    controller.resync(ctx.client.clone(), ty, config.resync_interval);
    controller.start()
}

/// start every white listed controller, replicators and provisioner only run in the master
pub fn start_controllers(ctx: &ControllerContext) -> Vec<WorkQueue<ObjectKey>> {
    let mut queues = vec![];
    let config = &ctx.config;

    whitelist!(config, INSTANCE_CONTROLLER, queues.push(start_instance_controller(ctx)));

    if !config.is_master() {
        return queues;
    }

    whitelist!(
        config,
        SERVICE_REPLICATOR,
        queues.push(start_catalog_replicator::<ServiceSpec>(ctx, SERVICE_REPLICATOR))
    );
    whitelist!(
        config,
        PLAN_REPLICATOR,
        queues.push(start_catalog_replicator::<PlanSpec>(ctx, PLAN_REPLICATOR))
    );
    whitelist!(config, INSTANCE_REPLICATOR, queues.push(start_instance_replicator(ctx)));
    whitelist!(config, PROVISIONER_CONTROLLER, queues.push(start_provisioner(ctx)));
    queues
}
