//!
//! # Watch bridge
//!
//! Forwards changes made in sister clusters into local channels, one channel
//! per watched kind, so replicators can react to them like to local events.
//!

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use async_lock::Mutex;
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::select;
use tracing::{debug, error, info, instrument, warn};

use fluvio_future::task::spawn;
use fluvio_future::timer::sleep;

use interoperator_metadata::{ResourceClient, SharedClient, TypeMeta, WatchEvent};

use crate::registry::{RegistryError, SharedRegistry};

/// notified by the provisioner when clusters join or leave
#[async_trait]
pub trait ClusterWatchHook: Send + Sync + Debug {
    async fn add_cluster(&self, cluster_id: &str) -> Result<(), RegistryError>;

    async fn remove_cluster(&self, cluster_id: &str);
}

pub type SharedWatchHook = Arc<dyn ClusterWatchHook>;

type EventChannel = (Sender<WatchEvent>, Receiver<WatchEvent>);

#[derive(Debug)]
pub struct WatchManager {
    registry: SharedRegistry,
    channels: HashMap<TypeMeta, EventChannel>,
    // closing the sender stops every watch of the cluster
    clusters: Mutex<HashMap<String, Sender<()>>>,
    reconnect: Duration,
}

impl WatchManager {
    pub fn new(registry: SharedRegistry, kinds: Vec<TypeMeta>, reconnect: Duration) -> Self {
        let channels = kinds
            .into_iter()
            .map(|ty| (ty, async_channel::unbounded()))
            .collect();
        Self {
            registry,
            channels,
            clusters: Mutex::new(HashMap::new()),
            reconnect,
        }
    }

    /// events of kind from every bridged cluster.
    /// Receivers share the stream, each event is delivered to one of them.
    pub fn watch_channel(&self, ty: &TypeMeta) -> Option<Receiver<WatchEvent>> {
        self.channels.get(ty).map(|(_, receiver)| receiver.clone())
    }

    /// bridge every registered sister cluster
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), RegistryError> {
        for cluster in self.registry.list_clusters(None).await? {
            let cluster_id = cluster.name();
            if let Err(err) = self.add_cluster(cluster_id).await {
                error!(cluster_id, %err, "unable to watch cluster");
            }
        }
        Ok(())
    }

    pub async fn is_watching(&self, cluster_id: &str) -> bool {
        self.clusters.lock().await.contains_key(cluster_id)
    }
}

#[async_trait]
impl ClusterWatchHook for WatchManager {
    async fn add_cluster(&self, cluster_id: &str) -> Result<(), RegistryError> {
        // master changes are seen by the local watches
        if cluster_id == self.registry.master_id() {
            return Ok(());
        }

        let mut clusters = self.clusters.lock().await;
        if clusters.contains_key(cluster_id) {
            return Ok(());
        }

        let client = self.registry.get_client(cluster_id).await?;
        let (stop_sender, stop) = async_channel::bounded(1);
        for (ty, (events, _)) in &self.channels {
            spawn(bridge_loop(
                cluster_id.to_owned(),
                client.clone(),
                ty.clone(),
                events.clone(),
                stop.clone(),
                self.reconnect,
            ));
        }
        clusters.insert(cluster_id.to_owned(), stop_sender);
        info!(cluster_id, "watching cluster");
        Ok(())
    }

    async fn remove_cluster(&self, cluster_id: &str) {
        if let Some(stop) = self.clusters.lock().await.remove(cluster_id) {
            stop.close();
            info!(cluster_id, "stopped watching cluster");
        }
    }
}

#[instrument(skip(client, events, stop, reconnect), fields(%ty))]
async fn bridge_loop(
    cluster_id: String,
    client: SharedClient,
    ty: TypeMeta,
    events: Sender<WatchEvent>,
    stop: Receiver<()>,
    reconnect: Duration,
) {
    loop {
        let mut stream = client.watch(&ty);
        loop {
            select! {
                _ = stop.recv() => {
                    debug!("bridge stopped");
                    return;
                },
                item = stream.next() => match item {
                    Some(Ok(event)) => {
                        if events.send(event).await.is_err() {
                            return;
                        }
                    }
                    Some(Err(err)) => {
                        warn!(%err, "watch failed");
                        break;
                    }
                    None => {
                        debug!("watch ended");
                        break;
                    }
                }
            }
        }

        select! {
            _ = stop.recv() => return,
            _ = sleep(reconnect) => {}
        }
    }
}

#[cfg(test)]
mod test {

    use std::collections::BTreeMap;

    use interoperator_metadata::{DynamicObject, ObjectMeta};
    use interoperator_metadata::builtin::secret;
    use interoperator_metadata::client::MemoryClient;
    use interoperator_metadata::cluster::{Cluster, ClusterSpec};

    use crate::registry::{CLUSTER_SECRET_KEY, DefaultClusterRegistry, LocalClientFactory};

    use super::*;

    async fn setup() -> (WatchManager, SharedClient) {
        let master = MemoryClient::new_shared();
        let sister = MemoryClient::new_shared();
        let factory = Arc::new(LocalClientFactory::default());
        factory.add("sister", sister.clone()).await;

        master
            .create_obj(Cluster::new(
                ObjectMeta::new("2", "default"),
                ClusterSpec {
                    secret_ref: "cluster-2".to_owned(),
                },
            ))
            .await
            .expect("cluster");
        let mut data = BTreeMap::new();
        data.insert(CLUSTER_SECRET_KEY.to_owned(), b"sister".to_vec());
        master
            .create(secret("cluster-2", "default", &data))
            .await
            .expect("secret");

        let registry = DefaultClusterRegistry::shared("1", master, "default", factory);
        let manager = WatchManager::new(
            registry,
            vec![TypeMeta::new("v1", "ConfigMap")],
            Duration::from_millis(10),
        );
        (manager, sister)
    }

    #[fluvio_future::test]
    async fn test_sister_events_forwarded() {
        let (manager, sister) = setup().await;
        let ty = TypeMeta::new("v1", "ConfigMap");
        let events = manager.watch_channel(&ty).expect("channel");
        assert!(manager.watch_channel(&TypeMeta::new("v1", "Secret")).is_none());

        manager.start().await.expect("start");
        manager.add_cluster("2").await.expect("idempotent");
        manager.add_cluster("1").await.expect("master ignored");
        assert!(manager.is_watching("2").await);
        assert!(!manager.is_watching("1").await);

        sister
            .create(DynamicObject::new(&ty, ObjectMeta::new("c1", "ns")))
            .await
            .expect("create");
        let event = events.recv().await.expect("event");
        assert!(matches!(event, WatchEvent::Added(_)));
        assert_eq!(event.object().name(), "c1");
        assert!(events.is_empty());

        manager.remove_cluster("2").await;
        assert!(!manager.is_watching("2").await);
        sleep(Duration::from_millis(50)).await;
        sister
            .create(DynamicObject::new(&ty, ObjectMeta::new("c2", "ns")))
            .await
            .expect("create");
        sleep(Duration::from_millis(50)).await;
        assert!(events.is_empty());
    }

    #[fluvio_future::test]
    async fn test_unknown_cluster_rejected() {
        let (manager, _) = setup().await;
        let err = manager.add_cluster("7").await.expect_err("unknown");
        assert!(err.is_not_found());
        assert!(!manager.is_watching("7").await);
    }
}
