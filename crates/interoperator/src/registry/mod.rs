//!
//! # Cluster registry
//!
//! Resolves a cluster id to a client for that cluster. Clients of sister
//! clusters are built from the credential secret of their `SFCluster` record
//! and cached for the life of the process.
//!

mod factory;

pub use factory::{ClientFactory, LocalClientFactory, CLUSTER_SECRET_KEY};

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::Arc;

use async_lock::RwLock;
use async_trait::async_trait;
use tracing::{debug, info, instrument};

use interoperator_metadata::{ObjectKey, SharedClient};
use interoperator_metadata::builtin::secret_type;
use interoperator_metadata::client::ClientError;
use interoperator_metadata::cluster::{Cluster, ClusterSpec};

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("cluster {cluster_id} not found: {reason}")]
    NotFound { cluster_id: String, reason: String },
    #[error("cluster api: {0}")]
    Client(#[from] ClientError),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Client(err) => err.is_not_found(),
        }
    }

    pub(crate) fn not_found(cluster_id: &str, reason: impl Into<String>) -> Self {
        Self::NotFound {
            cluster_id: cluster_id.to_owned(),
            reason: reason.into(),
        }
    }
}

pub type SharedRegistry = Arc<dyn ClusterRegistry>;

#[async_trait]
pub trait ClusterRegistry: Send + Sync + Debug {
    /// id of the cluster this process runs in
    fn master_id(&self) -> &str;

    async fn get_client(&self, cluster_id: &str) -> Result<SharedClient, RegistryError>;

    /// registered clusters of the registry namespace, restricted to those
    /// carrying every label of `selector` when one is given
    async fn list_clusters(
        &self,
        selector: Option<&BTreeMap<String, String>>,
    ) -> Result<Vec<Cluster>, RegistryError>;

    /// forget cached client of cluster
    async fn evict(&self, cluster_id: &str);
}

#[derive(Debug)]
pub struct DefaultClusterRegistry {
    master_id: String,
    master: SharedClient,
    namespace: String,
    factory: Arc<dyn ClientFactory>,
    clients: RwLock<HashMap<String, SharedClient>>,
}

impl DefaultClusterRegistry {
    pub fn new(
        master_id: impl Into<String>,
        master: SharedClient,
        namespace: impl Into<String>,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            master_id: master_id.into(),
            master,
            namespace: namespace.into(),
            factory,
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub fn shared(
        master_id: impl Into<String>,
        master: SharedClient,
        namespace: impl Into<String>,
        factory: Arc<dyn ClientFactory>,
    ) -> SharedRegistry {
        Arc::new(Self::new(master_id, master, namespace, factory))
    }

    async fn build_client(&self, cluster_id: &str) -> Result<SharedClient, RegistryError> {
        let key = ObjectKey::new(&self.namespace, cluster_id);
        let Some(cluster) = self.master.get_obj_opt::<ClusterSpec>(&key).await? else {
            return Err(RegistryError::not_found(cluster_id, "no cluster record"));
        };

        if cluster.spec.secret_ref.is_empty() {
            return Err(RegistryError::not_found(cluster_id, "no secret reference"));
        }

        let secret_key = ObjectKey::new(&self.namespace, &cluster.spec.secret_ref);
        let Some(secret) = self.master.get_opt(&secret_type(), &secret_key).await? else {
            return Err(RegistryError::not_found(
                cluster_id,
                format!("secret {secret_key} missing"),
            ));
        };

        self.factory.connect(cluster_id, &secret).await
    }
}

#[async_trait]
impl ClusterRegistry for DefaultClusterRegistry {
    fn master_id(&self) -> &str {
        &self.master_id
    }

    #[instrument(skip(self))]
    async fn get_client(&self, cluster_id: &str) -> Result<SharedClient, RegistryError> {
        if cluster_id == self.master_id {
            return Ok(self.master.clone());
        }

        if let Some(client) = self.clients.read().await.get(cluster_id) {
            return Ok(client.clone());
        }

        // built without holding the lock, a client cached meanwhile wins
        let built = self.build_client(cluster_id).await?;
        let mut write = self.clients.write().await;
        let client = write
            .entry(cluster_id.to_owned())
            .or_insert_with(|| {
                info!(cluster_id, "built cluster client");
                built
            })
            .clone();
        Ok(client)
    }

    async fn list_clusters(
        &self,
        selector: Option<&BTreeMap<String, String>>,
    ) -> Result<Vec<Cluster>, RegistryError> {
        let clusters = self
            .master
            .list_obj::<ClusterSpec>(Some(&self.namespace))
            .await?;
        Ok(match selector {
            Some(selector) => clusters
                .into_iter()
                .filter(|cluster| {
                    selector
                        .iter()
                        .all(|(key, value)| cluster.metadata.labels.get(key) == Some(value))
                })
                .collect(),
            None => clusters,
        })
    }

    async fn evict(&self, cluster_id: &str) {
        let mut write = self.clients.write().await;
        if write.remove(cluster_id).is_some() {
            debug!(cluster_id, "evicted cluster client");
        }
    }
}
