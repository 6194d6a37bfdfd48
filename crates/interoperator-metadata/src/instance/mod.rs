mod state;

pub use state::{InstanceState, LastOperation, ErrorCount, UnknownState};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::meta::ResourceRef;
use crate::object::{Crd, CrdNames, Object, Spec};

const INSTANCE_API: Crd = Crd {
    group: "osb.servicefabrik.io",
    version: "v1alpha1",
    names: CrdNames {
        kind: "SFServiceInstance",
        plural: "sfserviceinstances",
        singular: "sfserviceinstance",
    },
    namespaced: true,
};

const BINDING_API: Crd = Crd {
    group: "osb.servicefabrik.io",
    version: "v1alpha1",
    names: CrdNames {
        kind: "SFServiceBinding",
        plural: "sfservicebindings",
        singular: "sfservicebinding",
    },
    namespaced: true,
};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceInstanceSpec {
    pub service_id: String,
    pub plan_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub organization_guid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub space_guid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_values: Option<Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceInstanceStatus {
    pub state: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "dashboardUrl", skip_serializing_if = "String::is_empty")]
    pub dashboard_url: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceRef>,
}

impl Spec for ServiceInstanceSpec {
    type Status = ServiceInstanceStatus;

    fn metadata() -> &'static Crd {
        &INSTANCE_API
    }
}

pub type ServiceInstance = Object<ServiceInstanceSpec>;

impl Object<ServiceInstanceSpec> {
    pub fn state(&self) -> Result<InstanceState, UnknownState> {
        self.status.state.parse()
    }

    pub fn set_state(&mut self, state: InstanceState) {
        self.status.state = state.as_str().to_owned();
    }

    /// owning cluster, empty id counts as unset
    pub fn cluster_id(&self) -> Option<&str> {
        self.spec.cluster_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn last_operation(&self) -> Result<LastOperation, UnknownState> {
        LastOperation::from_meta(&self.metadata)
    }

    pub fn set_last_operation(&mut self, operation: LastOperation) {
        operation.write(&mut self.metadata);
    }

    pub fn error_count(&self) -> ErrorCount {
        ErrorCount::from_meta(&self.metadata)
    }

    pub fn set_error_count(&mut self, count: ErrorCount) {
        count.write(&mut self.metadata);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceBindingSpec {
    pub id: String,
    pub instance_id: String,
    pub service_id: String,
    pub plan_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl Spec for ServiceBindingSpec {
    type Status = ServiceInstanceStatus;

    fn metadata() -> &'static Crd {
        &BINDING_API
    }
}

pub type ServiceBinding = Object<ServiceBindingSpec>;

#[cfg(test)]
mod test {

    use serde_json::json;

    use crate::meta::ObjectMeta;
    use crate::object::DynamicObject;

    use super::*;

    #[test]
    fn test_instance_wire_format() {
        let dynamic = DynamicObject::try_from(json!({
            "apiVersion": "osb.servicefabrik.io/v1alpha1",
            "kind": "SFServiceInstance",
            "metadata": {"name": "i1", "namespace": "sf-i1", "labels": {"errorCount": "2"}},
            "spec": {
                "serviceId": "svc",
                "planId": "plan",
                "clusterId": "2",
                "parameters": {"foo": 1}
            },
            "status": {"state": "in progress", "dashboardUrl": "http://x", "resources": [
                {"apiVersion": "v1", "kind": "Secret", "name": "s", "namespace": "sf-i1"}
            ]}
        }))
        .expect("dynamic");

        let instance = ServiceInstance::from_dynamic(dynamic).expect("typed");
        assert_eq!(instance.cluster_id(), Some("2"));
        assert_eq!(instance.state(), Ok(InstanceState::InProgress));
        assert_eq!(instance.error_count(), ErrorCount(2));
        assert_eq!(instance.last_operation(), Ok(LastOperation::InQueue));
        assert_eq!(instance.status.dashboard_url, "http://x");
        assert_eq!(instance.status.resources[0].kind, "Secret");
    }

    #[test]
    fn test_empty_cluster_id_is_unset() {
        let mut instance = ServiceInstance::new(
            ObjectMeta::new("i1", "default"),
            ServiceInstanceSpec::default(),
        );
        assert_eq!(instance.cluster_id(), None);
        instance.spec.cluster_id = Some(String::new());
        assert_eq!(instance.cluster_id(), None);
        instance.set_state(InstanceState::Delete);
        assert_eq!(instance.status.state, "delete");
    }
}
