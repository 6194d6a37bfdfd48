use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::object::{Crd, CrdNames, Object, Spec};

const SERVICE_API: Crd = Crd {
    group: "osb.servicefabrik.io",
    version: "v1alpha1",
    names: CrdNames {
        kind: "SFService",
        plural: "sfservices",
        singular: "sfservice",
    },
    namespaced: true,
};

const PLAN_API: Crd = Crd {
    group: "osb.servicefabrik.io",
    version: "v1alpha1",
    names: CrdNames {
        kind: "SFPlan",
        plural: "sfplans",
        singular: "sfplan",
    },
    namespaced: true,
};

/// catalog entry of a service offering
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceSpec {
    pub name: String,
    pub id: String,
    pub description: String,
    pub bindable: bool,
    pub plan_updatable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogStatus {}

impl Spec for ServiceSpec {
    type Status = CatalogStatus;

    fn metadata() -> &'static Crd {
        &SERVICE_API
    }
}

pub type Service = Object<ServiceSpec>;

/// template attached to a plan
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSpec {
    pub action: String,
    #[serde(rename = "type")]
    pub template_type: String,
    pub content: String,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanSpec {
    pub name: String,
    pub id: String,
    pub description: String,
    pub service_id: String,
    pub free: bool,
    pub bindable: bool,
    pub plan_updatable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    pub templates: Vec<TemplateSpec>,
}

impl PlanSpec {
    pub fn template(&self, action: &str) -> Option<&TemplateSpec> {
        self.templates.iter().find(|t| t.action == action)
    }
}

impl Spec for PlanSpec {
    type Status = CatalogStatus;

    fn metadata() -> &'static Crd {
        &PLAN_API
    }
}

pub type Plan = Object<PlanSpec>;

#[cfg(test)]
mod test {

    use serde_json::json;

    use super::*;

    #[test]
    fn test_plan_templates() {
        let plan: PlanSpec = serde_json::from_value(json!({
            "name": "small",
            "id": "plan-1",
            "serviceId": "svc-1",
            "templates": [
                {"action": "provision", "type": "gotemplate", "content": "kind: A"},
                {"action": "status", "type": "static", "content": "provision: {}"}
            ]
        }))
        .expect("plan");

        assert_eq!(plan.service_id, "svc-1");
        assert_eq!(
            plan.template("status").map(|t| t.template_type.as_str()),
            Some("static")
        );
        assert!(plan.template("bind").is_none());
    }
}
