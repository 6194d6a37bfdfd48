//!
//! # Controller runtime
//!
//! A controller owns a work queue of object keys. Sources feed the queue from
//! watches, bridged channels or periodic resyncs, and a fixed number of workers
//! drain it through a [`Reconciler`]. Failed keys are requeued with a per key
//! exponential backoff.
//!

mod queue;
mod retry;
mod source;

pub use queue::WorkQueue;
pub use retry::{RetryPolicy, retry};
pub use source::{KeyMapper, own_key, own_mapper, owner_key};

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use adaptive_backoff::prelude::{
    Backoff, BackoffBuilder, ExponentialBackoff, ExponentialBackoffBuilder,
};
use async_channel::Receiver;
use async_lock::Mutex;
use async_trait::async_trait;
use futures_util::FutureExt;
use tracing::{debug, error, info, instrument};

use fluvio_future::task::spawn;

use interoperator_metadata::{ObjectKey, SharedClient, TypeMeta, WatchEvent};

/// what to do with a key after a successful reconcile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// wait for the next change
    Await,
    Requeue(Duration),
}

#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    type Error: Display + Send + Sync;

    async fn reconcile(&self, key: &ObjectKey) -> Result<Action, Self::Error>;
}

/// backoff applied to keys whose reconcile failed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequeuePolicy {
    pub min: Duration,
    pub max: Duration,
    pub factor: f64,
}

impl Default for RequeuePolicy {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(1),
            max: Duration::from_secs(30),
            factor: 1.1,
        }
    }
}

impl RequeuePolicy {
    fn create_backoff(&self) -> anyhow::Result<ExponentialBackoff> {
        ExponentialBackoffBuilder::default()
            .factor(self.factor)
            .min(self.min)
            .max(self.max)
            .build()
    }
}

pub struct Controller<R: Reconciler> {
    name: String,
    reconciler: Arc<R>,
    queue: WorkQueue<ObjectKey>,
    workers: usize,
    requeue: RequeuePolicy,
}

impl<R: Reconciler> Controller<R> {
    pub fn new(name: impl Into<String>, reconciler: R, workers: usize) -> Self {
        Self {
            name: name.into(),
            reconciler: Arc::new(reconciler),
            queue: WorkQueue::new(),
            workers: workers.max(1),
            requeue: RequeuePolicy::default(),
        }
    }

    pub fn with_requeue(mut self, requeue: RequeuePolicy) -> Self {
        self.requeue = requeue;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue(&self) -> WorkQueue<ObjectKey> {
        self.queue.clone()
    }

    /// reconcile objects of type when they change
    pub fn watch_own(&self, client: SharedClient, ty: TypeMeta, reconnect: Duration) -> &Self {
        spawn(source::watch_loop(client, ty, self.queue(), own_mapper(), reconnect));
        self
    }

    /// reconcile the controlling owner of kind `owner_kind` when an object of type changes
    pub fn watch_owned(
        &self,
        client: SharedClient,
        ty: TypeMeta,
        owner_kind: impl Into<String>,
        reconnect: Duration,
    ) -> &Self {
        let owner_kind = Arc::new(owner_kind.into());
        let mapper: KeyMapper = Arc::new(move |event: WatchEvent| {
            let owner_kind = owner_kind.clone();
            async move { owner_key(&event, &owner_kind) }.boxed()
        });
        spawn(source::watch_loop(client, ty, self.queue(), mapper, reconnect));
        self
    }

    /// reconcile the keys computed by mapper for every change of type
    pub fn watch_mapped(
        &self,
        client: SharedClient,
        ty: TypeMeta,
        mapper: KeyMapper,
        reconnect: Duration,
    ) -> &Self {
        spawn(source::watch_loop(client, ty, self.queue(), mapper, reconnect));
        self
    }

    /// reconcile events received from another component, such as a cluster bridge
    pub fn watch_channel(&self, events: Receiver<WatchEvent>, mapper: KeyMapper) -> &Self {
        spawn(source::channel_loop(events, self.queue(), mapper));
        self
    }

    /// periodically reconcile every object of type
    pub fn resync(&self, client: SharedClient, ty: TypeMeta, interval: Duration) -> &Self {
        spawn(source::resync_loop(client, ty, self.queue(), interval));
        self
    }

    pub fn start(self) -> WorkQueue<ObjectKey> {
        info!(name = %self.name, workers = self.workers, "starting controller");
        let backoffs = Arc::new(Mutex::new(HashMap::new()));
        for id in 0..self.workers {
            let worker = Worker {
                name: self.name.clone(),
                id,
                reconciler: self.reconciler.clone(),
                queue: self.queue.clone(),
                requeue: self.requeue,
                backoffs: backoffs.clone(),
            };
            spawn(worker.dispatch_loop());
        }
        self.queue
    }
}

struct Worker<R: Reconciler> {
    name: String,
    id: usize,
    reconciler: Arc<R>,
    queue: WorkQueue<ObjectKey>,
    requeue: RequeuePolicy,
    backoffs: Arc<Mutex<HashMap<ObjectKey, ExponentialBackoff>>>,
}

impl<R: Reconciler> Worker<R> {
    #[instrument(skip(self), fields(controller = %self.name, worker = self.id))]
    async fn dispatch_loop(self) {
        while let Some(key) = self.queue.get().await {
            match self.reconciler.reconcile(&key).await {
                Ok(action) => {
                    self.backoffs.lock().await.remove(&key);
                    if let Action::Requeue(after) = action {
                        debug!(%key, ?after, "requeue");
                        self.queue.add_after(key.clone(), after);
                    }
                }
                Err(err) => {
                    let wait = self.next_wait(&key).await;
                    error!(%key, %err, ?wait, "reconcile failed");
                    self.queue.add_after(key.clone(), wait);
                }
            }
            self.queue.done(&key).await;
        }
        debug!("queue shut down");
    }

    async fn next_wait(&self, key: &ObjectKey) -> Duration {
        let mut backoffs = self.backoffs.lock().await;
        if let Some(backoff) = backoffs.get_mut(key) {
            return backoff.wait();
        }
        match self.requeue.create_backoff() {
            Ok(mut backoff) => {
                let wait = backoff.wait();
                backoffs.insert(key.clone(), backoff);
                wait
            }
            Err(err) => {
                error!(%err, "invalid requeue policy");
                self.requeue.max
            }
        }
    }
}
