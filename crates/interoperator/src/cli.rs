//!
//! # CLI for the interoperator
//!
//! Parameters are overwritten in the following sequence:
//!     1) default values
//!     2) config file if provided, otherwise the interoperator ConfigMap
//!     3) cli parameters
//!

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use interoperator_metadata::SharedClient;
use interoperator_metadata::constants::{
    DEFAULT_MASTER_CLUSTER_ID, DEFAULT_SERVICE_FABRIK_NAMESPACE, OWN_CLUSTER_ID_ENV_KEY,
};

use crate::config::{InteroperatorConfig, StartConfig};

/// cli options
#[derive(Debug, Parser)]
#[command(name = "interoperator", about = "Multi cluster service instance controller")]
pub struct InteroperatorOpt {
    /// id of the cluster this process runs in
    #[arg(long, env = OWN_CLUSTER_ID_ENV_KEY, default_value = DEFAULT_MASTER_CLUSTER_ID)]
    own_cluster_id: String,

    // service fabrik namespace
    #[arg(short = 'n', long = "namespace", value_name = "namespace")]
    namespace: Option<String>,

    /// interoperator config file, overrides the config map
    #[arg(long, value_name = "config path")]
    config: Option<PathBuf>,

    /// directory of yaml manifests loaded into the local cluster at startup
    #[arg(long, value_name = "manifest dir")]
    seed: Option<PathBuf>,

    /// only allow white list of controllers
    #[arg(long)]
    white_list: Vec<String>,
}

impl InteroperatorOpt {
    pub fn seed_dir(&self) -> Option<&PathBuf> {
        self.seed.as_ref()
    }

    /// resolve the start configuration, reading the config map of the local cluster
    pub async fn as_start_config(&self, client: &SharedClient) -> Result<StartConfig> {
        let namespace = self
            .namespace
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVICE_FABRIK_NAMESPACE.to_owned());

        let interoperator = match &self.config {
            Some(path) => InteroperatorConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => InteroperatorConfig::load(client, &namespace)
                .await
                .context("loading config map")?,
        };

        let config = StartConfig {
            own_cluster_id: self.own_cluster_id.clone(),
            namespace,
            white_list: self.white_list.iter().cloned().collect(),
            interoperator,
        };
        info!(
            own_cluster_id = %config.own_cluster_id,
            namespace = %config.namespace,
            master = config.is_master(),
            "configuration resolved"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod test {

    use clap::Parser;

    use interoperator_metadata::client::MemoryClient;

    use super::*;

    #[fluvio_future::test]
    async fn test_defaults() {
        let opt = InteroperatorOpt::parse_from(["interoperator", "--own-cluster-id", "1"]);
        let config = opt
            .as_start_config(&MemoryClient::new_shared())
            .await
            .expect("config");
        assert_eq!(config.own_cluster_id, "1");
        assert_eq!(config.namespace, DEFAULT_SERVICE_FABRIK_NAMESPACE);
        assert!(config.is_master());
        assert!(config.is_enabled("instance"));
        assert_eq!(config.interoperator, InteroperatorConfig::default());
    }

    #[fluvio_future::test]
    async fn test_overrides() {
        let opt = InteroperatorOpt::parse_from([
            "interoperator",
            "--own-cluster-id",
            "2",
            "-n",
            "sf",
            "--white-list",
            "instance",
        ]);
        let config = opt
            .as_start_config(&MemoryClient::new_shared())
            .await
            .expect("config");
        assert_eq!(config.own_cluster_id, "2");
        assert_eq!(config.namespace, "sf");
        assert!(!config.is_master());
        assert!(config.is_enabled("instance"));
        assert!(!config.is_enabled("provisioner"));
    }
}
