mod common;

use std::sync::Arc;

use serde_json::json;

use interoperator::controllers::start_provisioner;
use interoperator::registry::LocalClientFactory;

use interoperator_metadata::{
    DynamicObject, ObjectKey, ObjectMeta, ResourceClient, SharedClient, TypeMeta,
};
use interoperator_metadata::builtin::{
    cluster_role_binding_type, crd_type, deployment_type, namespace_type, secret_type,
};
use interoperator_metadata::client::MemoryClient;
use interoperator_metadata::cluster::ClusterSpec;
use interoperator_metadata::constants::{
    FINALIZER_NAME, OWN_CLUSTER_ID_ENV_KEY, PROVISIONER_CLUSTER_ROLE_BINDING, PROVISIONER_NAME,
};

use common::*;

fn provisioner_deployment() -> DynamicObject {
    DynamicObject::new(
        &deployment_type(),
        ObjectMeta::new(PROVISIONER_NAME, NAMESPACE),
    )
    .with_field(
        "spec",
        json!({
            "replicas": 1,
            "template": {
                "spec": {
                    "containers": [{
                        "name": "interoperator",
                        "image": "servicefabrikjenkins/service-fabrik-interoperator:latest",
                        "env": [
                            {"name": OWN_CLUSTER_ID_ENV_KEY, "value": "1"},
                            {"name": "LOG_LEVEL", "value": "info"},
                        ],
                    }],
                },
            },
        }),
    )
}

async fn count(client: &SharedClient, ty: &TypeMeta) -> usize {
    client.list(ty, None).await.expect("list").len()
}

#[fluvio_future::test]
async fn test_bootstrap_and_release() {
    let master = MemoryClient::new_shared();
    master
        .create(provisioner_deployment())
        .await
        .expect("deployment");
    let factory = Arc::new(LocalClientFactory::default());

    let ctx = context(master.clone(), factory.clone(), "1");
    let queue = start_provisioner(&ctx);

    let sister = register_sister(&master, &factory, "2").await;

    wait_until("sister bootstrapped", || async {
        ctx.watch.is_watching("2").await
    })
    .await;

    assert_eq!(count(&sister, &crd_type()).await, 5);
    let namespaces = sister.list(&namespace_type(), None).await.expect("list");
    assert!(namespaces.iter().any(|ns| ns.name() == NAMESPACE));

    let record = sister
        .get_obj_opt::<ClusterSpec>(&ObjectKey::new(NAMESPACE, "2"))
        .await
        .expect("get")
        .expect("cluster record");
    assert_eq!(record.spec.secret_ref, "cluster-2");
    sister
        .get(&secret_type(), &ObjectKey::new(NAMESPACE, "cluster-2"))
        .await
        .expect("secret copied");

    let deployment = sister
        .get(&deployment_type(), &ObjectKey::new(NAMESPACE, PROVISIONER_NAME))
        .await
        .expect("deployment");
    let env = deployment
        .field("spec")
        .and_then(|spec| spec.pointer("/template/spec/containers/0/env"))
        .cloned()
        .expect("env");
    assert!(
        env.as_array()
            .expect("env list")
            .contains(&json!({"name": OWN_CLUSTER_ID_ENV_KEY, "value": "2"}))
    );
    assert!(
        env.as_array()
            .expect("env list")
            .contains(&json!({"name": "LOG_LEVEL", "value": "info"}))
    );

    let bindings = sister
        .list(&cluster_role_binding_type(), None)
        .await
        .expect("list");
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].name(), PROVISIONER_CLUSTER_ROLE_BINDING);

    let master_record = master
        .get_obj::<ClusterSpec>(&ObjectKey::new(NAMESPACE, "2"))
        .await
        .expect("master record");
    assert!(master_record.metadata.has_finalizer(FINALIZER_NAME));

    master
        .delete_obj::<ClusterSpec>(&ObjectKey::new(NAMESPACE, "2"))
        .await
        .expect("delete");
    wait_until("cluster released", || async {
        let gone = master
            .get_obj_opt::<ClusterSpec>(&ObjectKey::new(NAMESPACE, "2"))
            .await
            .expect("get")
            .is_none();
        gone && !ctx.watch.is_watching("2").await
    })
    .await;

    queue.shutdown();
}

#[fluvio_future::test]
async fn test_master_record_not_bootstrapped() {
    let master = MemoryClient::new_shared();
    master
        .create(provisioner_deployment())
        .await
        .expect("deployment");
    let factory = Arc::new(LocalClientFactory::default());

    let ctx = context(master.clone(), factory.clone(), "1");
    let queue = start_provisioner(&ctx);

    // registering the master itself only adds the finalizer
    let own = register_sister(&master, &factory, "1").await;
    wait_until("finalizer added", || async {
        master
            .get_obj_opt::<ClusterSpec>(&ObjectKey::new(NAMESPACE, "1"))
            .await
            .expect("get")
            .is_some_and(|c| c.metadata.has_finalizer(FINALIZER_NAME))
    })
    .await;

    assert_eq!(count(&own, &crd_type()).await, 0);
    assert!(!ctx.watch.is_watching("1").await);

    queue.shutdown();
}
