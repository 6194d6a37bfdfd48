use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use tracing::{debug, info, instrument, warn};

use interoperator_metadata::{
    Object, ObjectKey, ObjectMeta, ResourceClient, SharedClient, Spec, WatchEvent,
};

use crate::ReconcileError;
use crate::registry::SharedRegistry;
use crate::runtime::{Action, KeyMapper, Reconciler};

/// keeps a copy of every catalog object of kind `S` in each sister cluster
#[derive(Debug)]
pub struct CatalogReplicator<S> {
    master: SharedClient,
    registry: SharedRegistry,
    data: PhantomData<S>,
}

impl<S> CatalogReplicator<S>
where
    S: Spec + PartialEq,
{
    pub fn new(master: SharedClient, registry: SharedRegistry) -> Self {
        Self {
            master,
            registry,
            data: PhantomData,
        }
    }

    async fn replicate(
        &self,
        target: &SharedClient,
        source: &Object<S>,
    ) -> Result<(), ReconcileError> {
        let key = source.metadata.key();
        match target.get_obj_opt::<S>(&key).await? {
            None => {
                let mut meta = ObjectMeta::new(&key.name, &key.namespace);
                meta.labels = source.metadata.labels.clone();
                meta.annotations = source.metadata.annotations.clone();
                target
                    .create_obj(Object::<S>::new(meta, source.spec.clone()))
                    .await?;
                debug!(%key, "replica created");
            }
            Some(mut replica) => {
                if replica.metadata.labels == source.metadata.labels
                    && replica.metadata.annotations == source.metadata.annotations
                    && replica.spec == source.spec
                {
                    return Ok(());
                }
                replica.metadata.labels = source.metadata.labels.clone();
                replica.metadata.annotations = source.metadata.annotations.clone();
                replica.spec = source.spec.clone();
                target.update_obj(replica).await?;
                debug!(%key, "replica updated");
            }
        }
        Ok(())
    }
}

/// cluster changes enqueue the whole catalog so new clusters receive every entry
pub fn catalog_mapper<S: Spec>(master: SharedClient) -> KeyMapper {
    Arc::new(move |_event: WatchEvent| {
        let master = master.clone();
        async move {
            match master.list(&S::type_meta(), None).await {
                Ok(items) => items.iter().map(|obj| obj.metadata.key()).collect(),
                Err(err) => {
                    warn!(kind = S::kind(), %err, "listing catalog failed");
                    vec![]
                }
            }
        }
        .boxed()
    })
}

#[async_trait]
impl<S> Reconciler for CatalogReplicator<S>
where
    S: Spec + PartialEq,
{
    type Error = ReconcileError;

    #[instrument(skip(self), fields(kind = S::kind(), %key))]
    async fn reconcile(&self, key: &ObjectKey) -> Result<Action, ReconcileError> {
        let source = self
            .master
            .get_obj_opt::<S>(key)
            .await?
            .filter(|obj| !obj.metadata.is_being_deleted());

        let mut first_error = None;
        for cluster in self.registry.list_clusters(None).await? {
            let cluster_id = cluster.name();
            if cluster_id == self.registry.master_id() {
                continue;
            }

            let outcome = match self.registry.get_client(cluster_id).await {
                Ok(target) => match &source {
                    Some(source) => self.replicate(&target, source).await,
                    None => target
                        .delete_if_exists(&S::type_meta(), key)
                        .await
                        .map_err(ReconcileError::from),
                },
                Err(err) => Err(err.into()),
            };

            if let Err(err) = outcome {
                warn!(cluster_id, %err, "replication failed");
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                if source.is_none() {
                    info!("replicas removed");
                }
                Ok(Action::Await)
            }
        }
    }
}
