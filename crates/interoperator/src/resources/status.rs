use serde::{Deserialize, Serialize};

/// status reported by the status template of a plan
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Status {
    pub provision: OperationStatus,
    pub bind: OperationStatus,
    pub unbind: OperationStatus,
    pub deprovision: OperationStatus,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationStatus {
    pub state: String,
    pub error: String,
    pub response: String,
    #[serde(rename = "dashboardUrl")]
    pub dashboard_url: String,
}

impl Status {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        // an empty document is a status without information
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }
}
