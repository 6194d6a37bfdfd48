mod common;

use std::sync::Arc;

use interoperator::controllers::replicator::PLAN_REPLICATOR;
use interoperator::controllers::{
    start_catalog_replicator, start_instance_controller, start_instance_replicator,
};
use interoperator::registry::LocalClientFactory;

use interoperator_metadata::{ObjectKey, ResourceClient, SharedClient};
use interoperator_metadata::catalog::PlanSpec;
use interoperator_metadata::client::MemoryClient;
use interoperator_metadata::constants::FINALIZER_NAME;
use interoperator_metadata::instance::{InstanceState, ServiceInstanceSpec};

use common::*;

fn plan_key() -> ObjectKey {
    ObjectKey::new(NAMESPACE, "postgres-small")
}

async fn plan_description(client: &SharedClient) -> Option<String> {
    client
        .get_obj_opt::<PlanSpec>(&plan_key())
        .await
        .expect("get plan")
        .map(|plan| plan.spec.description)
}

#[fluvio_future::test]
async fn test_plan_replication() {
    let master = MemoryClient::new_shared();
    let factory = Arc::new(LocalClientFactory::default());
    let sister = register_sister(&master, &factory, "2").await;

    let ctx = context(master.clone(), factory.clone(), "1");
    let queue = start_catalog_replicator::<PlanSpec>(&ctx, PLAN_REPLICATOR);

    master.create_obj(plan()).await.expect("plan");
    wait_until("plan copied", || async {
        plan_description(&sister).await.is_some()
    })
    .await;

    let mut changed = master
        .get_obj::<PlanSpec>(&plan_key())
        .await
        .expect("plan");
    changed.spec.description = "small postgres".to_owned();
    master.update_obj(changed).await.expect("update");
    wait_until("plan updated", || async {
        plan_description(&sister).await.as_deref() == Some("small postgres")
    })
    .await;

    // clusters registered later receive the existing catalog
    let late = register_sister(&master, &factory, "3").await;
    wait_until("plan copied to new cluster", || async {
        plan_description(&late).await.as_deref() == Some("small postgres")
    })
    .await;

    master
        .delete_obj::<PlanSpec>(&plan_key())
        .await
        .expect("delete");
    wait_until("plan removed", || async {
        plan_description(&sister).await.is_none() && plan_description(&late).await.is_none()
    })
    .await;

    queue.shutdown();
}

#[fluvio_future::test]
async fn test_instance_served_by_sister_cluster() {
    let master = MemoryClient::new_shared();
    let factory = Arc::new(LocalClientFactory::default());
    let sister = register_sister(&master, &factory, "2").await;
    seed_catalog(&sister).await;

    let master_ctx = context(master.clone(), factory.clone(), "1");
    let replicator = start_instance_replicator(&master_ctx);
    master_ctx.watch.start().await.expect("bridge");

    let sister_ctx = context(sister.clone(), Arc::new(LocalClientFactory::default()), "2");
    let controller = start_instance_controller(&sister_ctx);

    let mut instance = new_instance("i1", "2", PLAN_ID);
    instance.metadata.add_finalizer(FINALIZER_NAME);
    master.create_obj(instance).await.expect("create");

    wait_until("master reports success", || async {
        fetch_instance(&master, "i1")
            .await
            .is_some_and(|i| i.state() == Ok(InstanceState::Succeeded))
    })
    .await;

    let served = fetch_instance(&master, "i1").await.expect("master copy");
    assert_eq!(served.status.description, "credentials i1-creds");
    let replica = fetch_instance(&sister, "i1").await.expect("replica");
    assert_eq!(replica.status, served.status);

    let mut deleting = served;
    deleting.set_state(InstanceState::Delete);
    master.update_obj(deleting).await.expect("update");
    master
        .delete_obj::<ServiceInstanceSpec>(&instance_key("i1"))
        .await
        .expect("delete");

    wait_until("instance removed everywhere", || async {
        fetch_instance(&sister, "i1").await.is_none()
            && fetch_instance(&master, "i1").await.is_none()
    })
    .await;

    replicator.shutdown();
    controller.shutdown();
}
