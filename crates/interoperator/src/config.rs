//!
//! # Interoperator configuration
//!
//! Values are resolved in the following order:
//!     1) default values
//!     2) `config` key of the interoperator ConfigMap, or a config file
//!     3) cli parameters
//!

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use interoperator_metadata::{ObjectKey, SharedClient, TypeMeta};
use interoperator_metadata::builtin::{config_map_data, config_map_type};
use interoperator_metadata::client::ClientError;
use interoperator_metadata::constants::{
    CONFIG_MAP_KEY, CONFIG_MAP_NAME, DEFAULT_MASTER_CLUSTER_ID, DEFAULT_SERVICE_FABRIK_NAMESPACE,
};

/// start controller only if it is white listed
macro_rules! whitelist {
    ($config:expr, $name:expr, $start:expr) => {
        if $config.is_enabled($name) {
            tracing::info!("starting {}", $name);
            $start
        } else {
            tracing::info!("skipping {}", $name);
        }
    };
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config map: {0}")]
    Client(#[from] ClientError),
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("reading config file: {0}")]
    Io(#[from] std::io::Error),
}

/// tunables of the controllers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InteroperatorConfig {
    pub instance_worker_count: usize,
    pub catalog_worker_count: usize,
    pub cluster_worker_count: usize,
    /// kinds owned by instances, changes re-enqueue the owner
    pub instance_controller_watch_list: Vec<TypeMeta>,
    #[serde(with = "humantime_serde")]
    pub resync_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub watch_reconnect_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
}

impl Default for InteroperatorConfig {
    fn default() -> Self {
        Self {
            instance_worker_count: 10,
            catalog_worker_count: 5,
            cluster_worker_count: 2,
            instance_controller_watch_list: vec![
                TypeMeta::new("apps/v1", "Deployment"),
                TypeMeta::new("v1", "Secret"),
            ],
            resync_interval: Duration::from_secs(60),
            watch_reconnect_delay: Duration::from_secs(5),
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl InteroperatorConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        Ok(config.normalize())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// load from the interoperator config map, absent map yields defaults
    pub async fn load(client: &SharedClient, namespace: &str) -> Result<Self, ConfigError> {
        let key = ObjectKey::new(namespace, CONFIG_MAP_NAME);
        let Some(config_map) = client.get_opt(&config_map_type(), &key).await? else {
            info!(%key, "no config map, using defaults");
            return Ok(Self::default());
        };

        match config_map_data(&config_map, CONFIG_MAP_KEY) {
            Some(text) => {
                debug!(%key, "loading config map");
                Self::from_yaml(text)
            }
            None => Ok(Self::default()),
        }
    }

    // worker counts must allow progress
    fn normalize(mut self) -> Self {
        let defaults = Self::default();
        if self.instance_worker_count == 0 {
            self.instance_worker_count = defaults.instance_worker_count;
        }
        if self.catalog_worker_count == 0 {
            self.catalog_worker_count = defaults.catalog_worker_count;
        }
        if self.cluster_worker_count == 0 {
            self.cluster_worker_count = defaults.cluster_worker_count;
        }
        self
    }
}

/// process wide settings resolved at startup
#[derive(Debug, Clone)]
pub struct StartConfig {
    pub own_cluster_id: String,
    pub namespace: String,
    pub white_list: HashSet<String>,
    pub interoperator: InteroperatorConfig,
}

impl Default for StartConfig {
    fn default() -> Self {
        Self {
            own_cluster_id: DEFAULT_MASTER_CLUSTER_ID.to_owned(),
            namespace: DEFAULT_SERVICE_FABRIK_NAMESPACE.to_owned(),
            white_list: HashSet::new(),
            interoperator: InteroperatorConfig::default(),
        }
    }
}

impl StartConfig {
    /// empty white list enables every controller
    pub fn is_enabled(&self, name: &str) -> bool {
        self.white_list.is_empty() || self.white_list.contains(name)
    }

    pub fn is_master(&self) -> bool {
        self.own_cluster_id == DEFAULT_MASTER_CLUSTER_ID
    }
}
