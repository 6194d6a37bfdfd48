use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_channel::{Receiver, Sender, unbounded};
use async_lock::{Mutex, RwLock};
use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tracing::{debug, trace};

use crate::meta::{ObjectKey, TypeMeta};
use crate::object::DynamicObject;

use super::{ClientError, ResourceClient, SharedClient, WatchEvent};

type Objects = HashMap<TypeMeta, BTreeMap<ObjectKey, DynamicObject>>;

/// in process api server.
/// Assigns uids and resource versions, honors finalizers and garbage
/// collects objects whose owner is removed.
#[derive(Debug, Default, Clone)]
pub struct MemoryClient {
    inner: Arc<MemoryStore>,
}

#[derive(Debug, Default)]
struct MemoryStore {
    objects: RwLock<Objects>,
    watchers: Mutex<HashMap<TypeMeta, Vec<Sender<WatchEvent>>>>,
    version: AtomicU64,
}

impl MemoryClient {
    pub fn new_shared() -> SharedClient {
        Arc::new(Self::default())
    }

    /// end every open watch stream
    pub async fn close_watches(&self) {
        let mut watchers = self.inner.watchers.lock().await;
        watchers.clear();
    }

    /// number of live watch subscriptions for type
    pub async fn watcher_count(&self, ty: &TypeMeta) -> usize {
        let mut watchers = self.inner.watchers.lock().await;
        match watchers.get_mut(ty) {
            Some(senders) => {
                senders.retain(|sender| !sender.is_closed());
                senders.len()
            }
            None => 0,
        }
    }
}

impl MemoryStore {
    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    async fn notify(&self, events: Vec<WatchEvent>) {
        if events.is_empty() {
            return;
        }
        let mut watchers = self.watchers.lock().await;
        for event in events {
            let ty = event.object().type_meta();
            if let Some(senders) = watchers.get_mut(&ty) {
                senders.retain(|sender| sender.try_send(event.clone()).is_ok());
            }
        }
    }

    async fn subscribe(&self, ty: TypeMeta) -> Receiver<WatchEvent> {
        // holding the object lock keeps the snapshot and the live events in order
        let objects = self.objects.read().await;
        let (sender, receiver) = unbounded();
        if let Some(store) = objects.get(&ty) {
            for obj in store.values() {
                let _ = sender.try_send(WatchEvent::Added(obj.clone()));
            }
        }
        let mut watchers = self.watchers.lock().await;
        watchers.entry(ty).or_default().push(sender);
        drop(watchers);
        drop(objects);
        receiver
    }

    /// delete honoring finalizers. returns false if object is absent
    fn delete_locked(
        &self,
        objects: &mut Objects,
        ty: &TypeMeta,
        key: &ObjectKey,
        events: &mut Vec<WatchEvent>,
    ) -> bool {
        let Some(obj) = objects.get_mut(ty).and_then(|store| store.get_mut(key)) else {
            return false;
        };

        if obj.metadata.finalizers.is_empty() {
            self.remove_locked(objects, ty, key, events);
        } else if !obj.metadata.is_being_deleted() {
            obj.metadata.mark_deleted();
            obj.metadata.resource_version = self.next_version();
            trace!(%ty, %key, "marked for deletion");
            events.push(WatchEvent::Modified(obj.clone()));
        }
        true
    }

    /// remove object and collect its dependents
    fn remove_locked(
        &self,
        objects: &mut Objects,
        ty: &TypeMeta,
        key: &ObjectKey,
        events: &mut Vec<WatchEvent>,
    ) {
        let Some(removed) = objects.get_mut(ty).and_then(|store| store.remove(key)) else {
            return;
        };
        debug!(%ty, %key, "removed");
        let uid = removed.metadata.uid.clone();
        events.push(WatchEvent::Deleted(removed));

        if uid.is_empty() {
            return;
        }

        let dependents: Vec<(TypeMeta, ObjectKey)> = objects
            .iter()
            .flat_map(|(dep_ty, store)| {
                store
                    .iter()
                    .filter(|(_, obj)| obj.metadata.is_owned_by(&uid))
                    .map(move |(dep_key, _)| (dep_ty.clone(), dep_key.clone()))
            })
            .collect();

        for (dep_ty, dep_key) in dependents {
            trace!(%dep_ty, %dep_key, owner = %uid, "collecting dependent");
            self.delete_locked(objects, &dep_ty, &dep_key, events);
        }
    }
}

#[async_trait]
impl ResourceClient for MemoryClient {
    async fn get(&self, ty: &TypeMeta, key: &ObjectKey) -> Result<DynamicObject, ClientError> {
        let objects = self.inner.objects.read().await;
        objects
            .get(ty)
            .and_then(|store| store.get(key))
            .cloned()
            .ok_or_else(|| ClientError::NotFound(not_found_ref(ty, key)))
    }

    async fn list(
        &self,
        ty: &TypeMeta,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>, ClientError> {
        let objects = self.inner.objects.read().await;
        let Some(store) = objects.get(ty) else {
            return Ok(vec![]);
        };
        Ok(store
            .values()
            .filter(|obj| namespace.is_none_or(|ns| obj.metadata.namespace == ns))
            .cloned()
            .collect())
    }

    async fn create(&self, mut obj: DynamicObject) -> Result<DynamicObject, ClientError> {
        if obj.metadata.name.is_empty() {
            return Err(ClientError::Invalid(format!("{} without name", obj.kind)));
        }

        let ty = obj.type_meta();
        let key = obj.metadata.key();

        let mut objects = self.inner.objects.write().await;
        let store = objects.entry(ty.clone()).or_default();
        if store.contains_key(&key) {
            return Err(ClientError::AlreadyExists(obj.resource_ref()));
        }

        obj.metadata.uid = uuid::Uuid::new_v4().to_string();
        obj.metadata.resource_version = self.inner.next_version();
        obj.metadata.deletion_timestamp = None;
        store.insert(key.clone(), obj.clone());
        debug!(%ty, %key, "created");

        self.inner.notify(vec![WatchEvent::Added(obj.clone())]).await;
        drop(objects);
        Ok(obj)
    }

    async fn update(&self, mut obj: DynamicObject) -> Result<DynamicObject, ClientError> {
        let ty = obj.type_meta();
        let key = obj.metadata.key();

        let mut objects = self.inner.objects.write().await;
        let Some(current) = objects.get(&ty).and_then(|store| store.get(&key)) else {
            return Err(ClientError::NotFound(obj.resource_ref()));
        };

        if !obj.metadata.resource_version.is_empty()
            && obj.metadata.resource_version != current.metadata.resource_version
        {
            return Err(ClientError::Conflict {
                target: obj.resource_ref(),
                resource_version: obj.metadata.resource_version,
            });
        }

        // server owned fields
        obj.metadata.uid = current.metadata.uid.clone();
        obj.metadata.deletion_timestamp = current.metadata.deletion_timestamp.clone();
        obj.metadata.resource_version = current.metadata.resource_version.clone();

        if obj == *current {
            trace!(%ty, %key, "no change");
            return Ok(obj);
        }

        let mut events = vec![];
        if obj.metadata.is_being_deleted() && obj.metadata.finalizers.is_empty() {
            self.inner.remove_locked(&mut objects, &ty, &key, &mut events);
        } else {
            obj.metadata.resource_version = self.inner.next_version();
            objects
                .entry(ty.clone())
                .or_default()
                .insert(key.clone(), obj.clone());
            trace!(%ty, %key, version = %obj.metadata.resource_version, "updated");
            events.push(WatchEvent::Modified(obj.clone()));
        }

        self.inner.notify(events).await;
        drop(objects);
        Ok(obj)
    }

    async fn delete(&self, ty: &TypeMeta, key: &ObjectKey) -> Result<(), ClientError> {
        let mut objects = self.inner.objects.write().await;
        let mut events = vec![];
        if !self.inner.delete_locked(&mut objects, ty, key, &mut events) {
            return Err(ClientError::NotFound(not_found_ref(ty, key)));
        }
        self.inner.notify(events).await;
        drop(objects);
        Ok(())
    }

    fn watch(&self, ty: &TypeMeta) -> BoxStream<'static, Result<WatchEvent, ClientError>> {
        let inner = self.inner.clone();
        let ty = ty.clone();
        async move { inner.subscribe(ty).await }
            .flatten_stream()
            .map(Ok)
            .boxed()
    }
}

fn not_found_ref(ty: &TypeMeta, key: &ObjectKey) -> crate::meta::ResourceRef {
    crate::meta::ResourceRef::new(ty, &key.name, &key.namespace)
}
