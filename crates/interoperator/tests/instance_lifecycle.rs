mod common;

use std::sync::Arc;

use interoperator::controllers::start_instance_controller;
use interoperator::registry::LocalClientFactory;

use interoperator_metadata::{ObjectKey, ResourceClient};
use interoperator_metadata::builtin::{config_map_type, secret_type};
use interoperator_metadata::client::MemoryClient;
use interoperator_metadata::constants::{FINALIZER_NAME, TIMEOUT_DESCRIPTION};
use interoperator_metadata::instance::{InstanceState, LastOperation, ServiceInstanceSpec};

use common::*;

#[fluvio_future::test]
async fn test_provision_and_deprovision() {
    let client = MemoryClient::new_shared();
    seed_catalog(&client).await;
    let ctx = context(client.clone(), Arc::new(LocalClientFactory::default()), "1");
    let queue = start_instance_controller(&ctx);

    client
        .create_obj(new_instance("i1", "1", PLAN_ID))
        .await
        .expect("create");

    wait_until("instance provisioned", || async {
        fetch_instance(&client, "i1")
            .await
            .is_some_and(|i| i.state() == Ok(InstanceState::Succeeded))
    })
    .await;

    let instance = fetch_instance(&client, "i1").await.expect("instance");
    assert_eq!(instance.last_operation(), Ok(LastOperation::InQueue));
    assert!(instance.metadata.has_finalizer(FINALIZER_NAME));
    assert_eq!(instance.status.description, "credentials i1-creds");
    assert_eq!(instance.status.dashboard_url, "https://dashboard/i1");
    assert_eq!(instance.status.resources.len(), 2);
    assert!(instance.error_count().is_zero());

    let creds = client
        .get(&secret_type(), &ObjectKey::new(INSTANCE_NAMESPACE, "i1-creds"))
        .await
        .expect("secret");
    assert!(creds.metadata.is_owned_by(&instance.metadata.uid));
    client
        .get(
            &config_map_type(),
            &ObjectKey::new(INSTANCE_NAMESPACE, "i1-settings"),
        )
        .await
        .expect("config map");

    let mut deleting = instance;
    deleting.set_state(InstanceState::Delete);
    client.update_obj(deleting).await.expect("update");
    client
        .delete_obj::<ServiceInstanceSpec>(&instance_key("i1"))
        .await
        .expect("delete");

    wait_until("instance removed", || async {
        fetch_instance(&client, "i1").await.is_none()
    })
    .await;

    let creds = client
        .get_opt(&secret_type(), &ObjectKey::new(INSTANCE_NAMESPACE, "i1-creds"))
        .await
        .expect("get");
    assert!(creds.is_none());

    queue.shutdown();
}

#[fluvio_future::test]
async fn test_instance_of_other_cluster_untouched() {
    let client = MemoryClient::new_shared();
    seed_catalog(&client).await;
    let ctx = context(client.clone(), Arc::new(LocalClientFactory::default()), "1");
    let queue = start_instance_controller(&ctx);

    client
        .create_obj(new_instance("i2", "2", PLAN_ID))
        .await
        .expect("create");
    client
        .create_obj(new_instance("i3", "1", PLAN_ID))
        .await
        .expect("create");

    wait_until("own instance provisioned", || async {
        fetch_instance(&client, "i3")
            .await
            .is_some_and(|i| i.state() == Ok(InstanceState::Succeeded))
    })
    .await;

    let other = fetch_instance(&client, "i2").await.expect("instance");
    assert_eq!(other.state(), Ok(InstanceState::InQueue));
    assert!(other.metadata.finalizers.is_empty());

    queue.shutdown();
}

#[fluvio_future::test]
async fn test_repeated_failures_mark_failed() {
    let client = MemoryClient::new_shared();
    seed_catalog(&client).await;
    let ctx = context(client.clone(), Arc::new(LocalClientFactory::default()), "1");
    let queue = start_instance_controller(&ctx);

    client
        .create_obj(new_instance("broken", "1", "no-such-plan"))
        .await
        .expect("create");

    wait_until("instance failed", || async {
        fetch_instance(&client, "broken")
            .await
            .is_some_and(|i| i.state() == Ok(InstanceState::Failed))
    })
    .await;

    let instance = fetch_instance(&client, "broken").await.expect("instance");
    assert_eq!(instance.status.description, TIMEOUT_DESCRIPTION);
    assert!(
        instance
            .status
            .error
            .starts_with("Retry threshold reached for broken.")
    );
    assert!(instance.error_count().is_zero());
    assert_eq!(instance.last_operation(), Ok(LastOperation::InQueue));

    queue.shutdown();
}
