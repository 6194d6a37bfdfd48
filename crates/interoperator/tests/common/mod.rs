#![allow(dead_code)]

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fluvio_future::timer::sleep;

use interoperator::config::{InteroperatorConfig, StartConfig};
use interoperator::controllers::ControllerContext;
use interoperator::registry::{CLUSTER_SECRET_KEY, LocalClientFactory};
use interoperator::resources::template::HANDLEBARS_TEMPLATE;
use interoperator::runtime::{RequeuePolicy, RetryPolicy};
use interoperator::start::create_context;

use interoperator_metadata::{Object, ObjectKey, ObjectMeta, ResourceClient, SharedClient};
use interoperator_metadata::builtin::secret;
use interoperator_metadata::catalog::{PlanSpec, ServiceSpec, TemplateSpec};
use interoperator_metadata::client::MemoryClient;
use interoperator_metadata::cluster::{Cluster, ClusterSpec};
use interoperator_metadata::instance::{
    InstanceState, ServiceInstance, ServiceInstanceSpec,
};

pub const NAMESPACE: &str = "default";
pub const INSTANCE_NAMESPACE: &str = "sf-instances";
pub const SERVICE_ID: &str = "svc-id";
pub const PLAN_ID: &str = "plan-id";

const PROVISION: &str = r#"
apiVersion: v1
kind: Secret
metadata:
  name: {{ instance.metadata.name }}-creds
data:
  user: {{ instance.metadata.name }}
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: {{ instance.metadata.name }}-settings
data:
  plan: {{ plan.spec.name }}
"#;

const SOURCES: &str = r#"
creds:
  apiVersion: v1
  kind: Secret
  name: {{ instance.metadata.name }}-creds
"#;

const STATUS: &str = r#"
provision:
  state: succeeded
  response: "credentials {{ sources.creds.metadata.name }}"
  dashboardUrl: "https://dashboard/{{ instance.metadata.name }}"
deprovision:
  state: in progress
"#;

/// context with short delays, running as cluster `own_id`
pub fn context(
    client: SharedClient,
    factory: Arc<LocalClientFactory>,
    own_id: &str,
) -> ControllerContext {
    let config = StartConfig {
        own_cluster_id: own_id.to_owned(),
        namespace: NAMESPACE.to_owned(),
        white_list: Default::default(),
        interoperator: InteroperatorConfig {
            watch_reconnect_delay: Duration::from_millis(20),
            retry_delay: Duration::from_millis(2),
            ..Default::default()
        },
    };
    let mut ctx = create_context(client, factory, config);
    ctx.retry = RetryPolicy::new(5, Duration::from_millis(2));
    ctx.requeue = RequeuePolicy {
        min: Duration::from_millis(5),
        max: Duration::from_millis(40),
        factor: 2.0,
    };
    ctx
}

/// register a sister cluster in the master, returns its client
pub async fn register_sister(
    master: &SharedClient,
    factory: &LocalClientFactory,
    cluster_id: &str,
) -> SharedClient {
    let sister = MemoryClient::new_shared();
    let endpoint = format!("endpoint-{cluster_id}");
    factory.add(endpoint.clone(), sister.clone()).await;

    let secret_name = format!("cluster-{cluster_id}");
    let mut data = BTreeMap::new();
    data.insert(CLUSTER_SECRET_KEY.to_owned(), endpoint.into_bytes());
    master
        .create(secret(&secret_name, NAMESPACE, &data))
        .await
        .expect("cluster secret");
    master
        .create_obj(Cluster::new(
            ObjectMeta::new(cluster_id, NAMESPACE),
            ClusterSpec {
                secret_ref: secret_name,
            },
        ))
        .await
        .expect("cluster record");
    sister
}

fn template(action: &str, content: &str) -> TemplateSpec {
    TemplateSpec {
        action: action.to_owned(),
        template_type: HANDLEBARS_TEMPLATE.to_owned(),
        content: content.to_owned(),
    }
}

pub fn service() -> Object<ServiceSpec> {
    Object::new(
        ObjectMeta::new("postgres", NAMESPACE),
        ServiceSpec {
            name: "postgres".to_owned(),
            id: SERVICE_ID.to_owned(),
            bindable: true,
            ..Default::default()
        },
    )
}

pub fn plan() -> Object<PlanSpec> {
    Object::new(
        ObjectMeta::new("postgres-small", NAMESPACE),
        PlanSpec {
            name: "small".to_owned(),
            id: PLAN_ID.to_owned(),
            service_id: SERVICE_ID.to_owned(),
            templates: vec![
                template("provision", PROVISION),
                template("sources", SOURCES),
                template("status", STATUS),
            ],
            ..Default::default()
        },
    )
}

pub async fn seed_catalog(client: &SharedClient) {
    client.create_obj(service()).await.expect("service");
    client.create_obj(plan()).await.expect("plan");
}

pub fn new_instance(name: &str, cluster_id: &str, plan_id: &str) -> ServiceInstance {
    let mut instance = Object::new(
        ObjectMeta::new(name, INSTANCE_NAMESPACE),
        ServiceInstanceSpec {
            service_id: SERVICE_ID.to_owned(),
            plan_id: plan_id.to_owned(),
            cluster_id: Some(cluster_id.to_owned()),
            ..Default::default()
        },
    );
    instance.set_state(InstanceState::InQueue);
    instance
}

pub fn instance_key(name: &str) -> ObjectKey {
    ObjectKey::new(INSTANCE_NAMESPACE, name)
}

pub async fn fetch_instance(client: &SharedClient, name: &str) -> Option<ServiceInstance> {
    client
        .get_obj_opt::<ServiceInstanceSpec>(&instance_key(name))
        .await
        .expect("fetch instance")
}

/// poll until check passes, panics after five seconds
pub async fn wait_until<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for {what}");
}
