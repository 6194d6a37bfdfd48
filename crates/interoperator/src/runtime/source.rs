use std::sync::Arc;
use std::time::Duration;

use async_channel::Receiver;
use futures_util::{FutureExt, StreamExt};
use futures_util::future::BoxFuture;
use tokio::select;
use tracing::{debug, info, instrument, warn};

use fluvio_future::timer::sleep;

use interoperator_metadata::{ObjectKey, ResourceClient, SharedClient, TypeMeta, WatchEvent};

use super::WorkQueue;

/// translate a change into the keys to reconcile
pub type KeyMapper = Arc<dyn Fn(WatchEvent) -> BoxFuture<'static, Vec<ObjectKey>> + Send + Sync>;

/// key of the changed object itself
pub fn own_key(event: &WatchEvent) -> Vec<ObjectKey> {
    vec![event.object().metadata.key()]
}

/// mapper enqueueing the changed object itself
pub fn own_mapper() -> KeyMapper {
    Arc::new(|event: WatchEvent| async move { own_key(&event) }.boxed())
}

/// key of the controlling owner of the changed object, when it is of owner kind
pub fn owner_key(event: &WatchEvent, owner_kind: &str) -> Vec<ObjectKey> {
    let obj = event.object();
    obj.metadata
        .controller_owner()
        .filter(|owner| owner.kind == owner_kind)
        .map(|owner| vec![ObjectKey::new(obj.metadata.namespace.clone(), owner.name.clone())])
        .unwrap_or_default()
}

/// forward watch events of type into the queue until the queue shuts down.
/// A closed or failed stream is re-established after the reconnect delay.
#[instrument(skip(client, queue, mapper), fields(%ty))]
pub(crate) async fn watch_loop(
    client: SharedClient,
    ty: TypeMeta,
    queue: WorkQueue<ObjectKey>,
    mapper: KeyMapper,
    reconnect: Duration,
) {
    loop {
        let mut stream = client.watch(&ty);
        debug!("watching");
        loop {
            select! {
                _ = queue.closed() => {
                    debug!("queue closed, stopping watch");
                    return;
                },
                item = stream.next() => match item {
                    Some(Ok(event)) => {
                        for key in mapper(event).await {
                            queue.add(key).await;
                        }
                    }
                    Some(Err(err)) => {
                        warn!(%err, "watch failed");
                        break;
                    }
                    None => {
                        info!("watch closed");
                        break;
                    }
                }
            }
        }

        select! {
            _ = queue.closed() => return,
            _ = sleep(reconnect) => {}
        }
    }
}

/// forward events received from a channel, stops when either side closes
pub(crate) async fn channel_loop(
    events: Receiver<WatchEvent>,
    queue: WorkQueue<ObjectKey>,
    mapper: KeyMapper,
) {
    loop {
        select! {
            _ = queue.closed() => return,
            event = events.recv() => match event {
                Ok(event) => {
                    for key in mapper(event).await {
                        queue.add(key).await;
                    }
                }
                Err(_) => {
                    debug!("event channel closed");
                    return;
                }
            }
        }
    }
}

/// enqueue every object of type each interval
#[instrument(skip(client, queue), fields(%ty))]
pub(crate) async fn resync_loop(
    client: SharedClient,
    ty: TypeMeta,
    queue: WorkQueue<ObjectKey>,
    interval: Duration,
) {
    loop {
        select! {
            _ = queue.closed() => return,
            _ = sleep(interval) => {}
        }
        match client.list(&ty, None).await {
            Ok(items) => {
                debug!(count = items.len(), "resync");
                for obj in items {
                    queue.add(obj.metadata.key()).await;
                }
            }
            Err(err) => warn!(%err, "resync list failed"),
        }
    }
}
