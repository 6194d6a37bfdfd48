use crate::meta::ResourceRef;
use crate::object::ConvertError;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("{0} not found")]
    NotFound(ResourceRef),
    #[error("conflict updating {target}: stale resource version {resource_version}")]
    Conflict {
        target: ResourceRef,
        resource_version: String,
    },
    #[error("{0} already exists")]
    AlreadyExists(ResourceRef),
    #[error("invalid object: {0}")]
    Invalid(String),
    #[error("conversion error: {0}")]
    Convert(#[from] ConvertError),
    #[error("watch closed")]
    WatchClosed,
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}
