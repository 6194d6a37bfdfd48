//!
//! Builders for the core kinds the control plane creates directly.
//!

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

use crate::meta::{ObjectMeta, TypeMeta};
use crate::object::{Crd, DynamicObject};

pub fn namespace_type() -> TypeMeta {
    TypeMeta::new("v1", "Namespace")
}

pub fn secret_type() -> TypeMeta {
    TypeMeta::new("v1", "Secret")
}

pub fn config_map_type() -> TypeMeta {
    TypeMeta::new("v1", "ConfigMap")
}

pub fn deployment_type() -> TypeMeta {
    TypeMeta::new("apps/v1", "Deployment")
}

pub fn cluster_role_binding_type() -> TypeMeta {
    TypeMeta::new("rbac.authorization.k8s.io/v1", "ClusterRoleBinding")
}

pub fn crd_type() -> TypeMeta {
    TypeMeta::new("apiextensions.k8s.io/v1", "CustomResourceDefinition")
}

const CLUSTER_SCOPED_KINDS: [&str; 4] = [
    "Namespace",
    "ClusterRole",
    "ClusterRoleBinding",
    "CustomResourceDefinition",
];

/// kinds that never live in a namespace
pub fn is_cluster_scoped_kind(kind: &str) -> bool {
    CLUSTER_SCOPED_KINDS.contains(&kind)
}

pub fn namespace(name: &str) -> DynamicObject {
    DynamicObject::new(&namespace_type(), ObjectMeta::named(name))
}

/// secret with base64 encoded data
pub fn secret(name: &str, namespace: &str, data: &BTreeMap<String, Vec<u8>>) -> DynamicObject {
    let encoded: serde_json::Map<String, Value> = data
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(STANDARD.encode(value))))
        .collect();
    DynamicObject::new(&secret_type(), ObjectMeta::new(name, namespace))
        .with_field("type", json!("Opaque"))
        .with_field("data", Value::Object(encoded))
}

/// decoded secret entry, None if absent or not base64
pub fn secret_data(secret: &DynamicObject, key: &str) -> Option<Vec<u8>> {
    let encoded = secret.field("data")?.get(key)?.as_str()?;
    STANDARD.decode(encoded).ok()
}

pub fn config_map(name: &str, namespace: &str, data: &BTreeMap<String, String>) -> DynamicObject {
    DynamicObject::new(&config_map_type(), ObjectMeta::new(name, namespace))
        .with_field("data", json!(data))
}

pub fn config_map_data<'a>(config_map: &'a DynamicObject, key: &str) -> Option<&'a str> {
    config_map.field("data")?.get(key)?.as_str()
}

/// bind cluster role to the default service account of namespace
pub fn cluster_role_binding(name: &str, role: &str, namespace: &str) -> DynamicObject {
    DynamicObject::new(&cluster_role_binding_type(), ObjectMeta::named(name))
        .with_field(
            "roleRef",
            json!({
                "apiGroup": "rbac.authorization.k8s.io",
                "kind": "ClusterRole",
                "name": role,
            }),
        )
        .with_field(
            "subjects",
            json!([{
                "kind": "ServiceAccount",
                "name": "default",
                "namespace": namespace,
            }]),
        )
}

/// definition registering custom resource with api server
pub fn custom_resource_definition(crd: &Crd) -> DynamicObject {
    let scope = if crd.namespaced { "Namespaced" } else { "Cluster" };
    DynamicObject::new(&crd_type(), ObjectMeta::named(crd.definition_name())).with_field(
        "spec",
        json!({
            "group": crd.group,
            "scope": scope,
            "names": {
                "kind": crd.names.kind,
                "plural": crd.names.plural,
                "singular": crd.names.singular,
            },
            "versions": [{
                "name": crd.version,
                "served": true,
                "storage": true,
                "subresources": {"status": {}},
                "schema": {"openAPIV3Schema": {
                    "type": "object",
                    "x-kubernetes-preserve-unknown-fields": true,
                }},
            }],
        }),
    )
}

/// set or replace env variable of every container in deployment
pub fn set_deployment_env(deployment: &mut DynamicObject, name: &str, value: &str) {
    let Some(containers) = deployment
        .data
        .get_mut("spec")
        .and_then(|spec| spec.pointer_mut("/template/spec/containers"))
        .and_then(Value::as_array_mut)
    else {
        return;
    };

    for container in containers.iter_mut() {
        let Some(container) = container.as_object_mut() else {
            continue;
        };
        let env = container
            .entry("env")
            .or_insert_with(|| Value::Array(vec![]));
        if !env.is_array() {
            *env = Value::Array(vec![]);
        }
        if let Some(env) = env.as_array_mut() {
            env.retain(|var| var.get("name").and_then(Value::as_str) != Some(name));
            env.push(json!({"name": name, "value": value}));
        }
    }
}
