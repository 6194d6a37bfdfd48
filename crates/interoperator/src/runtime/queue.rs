use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use async_lock::Mutex;
use tracing::trace;

use fluvio_future::task::spawn;
use fluvio_future::timer::sleep;

/// de-duplicating queue of keys.
///
/// A key is handed to at most one worker at a time: adding a key that is
/// being processed marks it dirty and it is queued again once the worker
/// calls [`WorkQueue::done`].
#[derive(Debug)]
pub struct WorkQueue<K> {
    inner: Arc<QueueInner<K>>,
}

impl<K> Clone for WorkQueue<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

#[derive(Debug)]
struct QueueInner<K> {
    sender: Sender<K>,
    receiver: Receiver<K>,
    state: Mutex<QueueState<K>>,
    // nothing is ever sent, closing it wakes up every `closed` future
    stop_sender: Sender<()>,
    stop: Receiver<()>,
}

#[derive(Debug)]
struct QueueState<K> {
    queued: HashSet<K>,
    processing: HashSet<K>,
    dirty: HashSet<K>,
}

impl<K> Default for WorkQueue<K>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> WorkQueue<K>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (sender, receiver) = async_channel::unbounded();
        let (stop_sender, stop) = async_channel::bounded(1);
        Self {
            inner: Arc::new(QueueInner {
                sender,
                receiver,
                state: Mutex::new(QueueState {
                    queued: HashSet::new(),
                    processing: HashSet::new(),
                    dirty: HashSet::new(),
                }),
                stop_sender,
                stop,
            }),
        }
    }

    /// queue key, returns false once the queue is shut down
    pub async fn add(&self, key: K) -> bool {
        if self.is_shutdown() {
            return false;
        }
        let mut state = self.inner.state.lock().await;
        if state.processing.contains(&key) {
            trace!(?key, "in process, marking dirty");
            state.dirty.insert(key);
            return true;
        }
        if !state.queued.insert(key.clone()) {
            return true;
        }
        self.inner.sender.try_send(key).is_ok()
    }

    /// add key once delay elapsed
    pub fn add_after(&self, key: K, delay: Duration) {
        let queue = self.clone();
        spawn(async move {
            sleep(delay).await;
            queue.add(key).await;
        });
    }

    /// next key to process, `None` after shutdown
    pub async fn get(&self) -> Option<K> {
        let key = self.inner.receiver.recv().await.ok()?;
        let mut state = self.inner.state.lock().await;
        state.queued.remove(&key);
        state.processing.insert(key.clone());
        Some(key)
    }

    /// release key taken by `get`
    pub async fn done(&self, key: &K) {
        let mut state = self.inner.state.lock().await;
        state.processing.remove(key);
        if state.dirty.remove(key) && state.queued.insert(key.clone()) {
            let _ = self.inner.sender.try_send(key.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.inner.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.receiver.is_empty()
    }

    pub fn shutdown(&self) {
        self.inner.sender.close();
        self.inner.stop_sender.close();
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.sender.is_closed()
    }

    /// resolves once the queue is shut down
    pub async fn closed(&self) {
        let _ = self.inner.stop.recv().await;
    }
}
