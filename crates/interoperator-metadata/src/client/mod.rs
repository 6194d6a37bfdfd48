mod error;
mod memory;

pub use error::ClientError;
pub use memory::MemoryClient;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::meta::{ObjectKey, TypeMeta};
use crate::object::{DynamicObject, Object, Spec};

pub type SharedClient = Arc<dyn ResourceClient>;

/// change to an object as observed by watch
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Added(DynamicObject),
    Modified(DynamicObject),
    Deleted(DynamicObject),
}

impl WatchEvent {
    pub fn object(&self) -> &DynamicObject {
        match self {
            Self::Added(obj) | Self::Modified(obj) | Self::Deleted(obj) => obj,
        }
    }

    pub fn into_object(self) -> DynamicObject {
        match self {
            Self::Added(obj) | Self::Modified(obj) | Self::Deleted(obj) => obj,
        }
    }
}

/// api of a single cluster
///
/// Updates use optimistic concurrency: when the resource version of the
/// submitted object is set and stale, the update fails with a conflict.
/// Deleting an object with finalizers only marks it as being deleted; it is
/// removed once an update clears its finalizers.
#[async_trait]
pub trait ResourceClient: Send + Sync + Debug {
    async fn get(&self, ty: &TypeMeta, key: &ObjectKey) -> Result<DynamicObject, ClientError>;

    /// list objects of type, optionally restricted to a namespace
    async fn list(
        &self,
        ty: &TypeMeta,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>, ClientError>;

    async fn create(&self, obj: DynamicObject) -> Result<DynamicObject, ClientError>;

    async fn update(&self, obj: DynamicObject) -> Result<DynamicObject, ClientError>;

    async fn delete(&self, ty: &TypeMeta, key: &ObjectKey) -> Result<(), ClientError>;

    /// stream of changes, starting with an added event for every existing object
    fn watch(&self, ty: &TypeMeta) -> BoxStream<'static, Result<WatchEvent, ClientError>>;
}

impl<'a> dyn ResourceClient + 'a {
    pub async fn get_opt(
        &self,
        ty: &TypeMeta,
        key: &ObjectKey,
    ) -> Result<Option<DynamicObject>, ClientError> {
        match self.get(ty, key).await {
            Ok(obj) => Ok(Some(obj)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// delete object, absent object is not an error
    pub async fn delete_if_exists(
        &self,
        ty: &TypeMeta,
        key: &ObjectKey,
    ) -> Result<(), ClientError> {
        match self.delete(ty, key).await {
            Err(err) if !err.is_not_found() => Err(err),
            _ => Ok(()),
        }
    }

    pub async fn get_obj<S: Spec>(&self, key: &ObjectKey) -> Result<Object<S>, ClientError> {
        let obj = self.get(&S::type_meta(), key).await?;
        Ok(Object::from_dynamic(obj)?)
    }

    pub async fn get_obj_opt<S: Spec>(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<Object<S>>, ClientError> {
        match self.get_opt(&S::type_meta(), key).await? {
            Some(obj) => Ok(Some(Object::from_dynamic(obj)?)),
            None => Ok(None),
        }
    }

    pub async fn list_obj<S: Spec>(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<Object<S>>, ClientError> {
        let items = self.list(&S::type_meta(), namespace).await?;
        items
            .into_iter()
            .map(|obj| Object::from_dynamic(obj).map_err(ClientError::from))
            .collect()
    }

    pub async fn create_obj<S: Spec>(&self, obj: Object<S>) -> Result<Object<S>, ClientError> {
        let created = self.create(obj.into_dynamic()?).await?;
        Ok(Object::from_dynamic(created)?)
    }

    pub async fn update_obj<S: Spec>(&self, obj: Object<S>) -> Result<Object<S>, ClientError> {
        let updated = self.update(obj.into_dynamic()?).await?;
        Ok(Object::from_dynamic(updated)?)
    }

    pub async fn delete_obj<S: Spec>(&self, key: &ObjectKey) -> Result<(), ClientError> {
        self.delete(&S::type_meta(), key).await
    }
}
