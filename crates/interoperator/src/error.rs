use interoperator_metadata::ConvertError;
use interoperator_metadata::client::ClientError;
use interoperator_metadata::instance::UnknownState;

use crate::registry::RegistryError;
use crate::resources::ResourceError;

/// failure of a single reconcile
#[derive(thiserror::Error, Debug)]
pub enum ReconcileError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    State(#[from] UnknownState),
    #[error("invalid status: {0}")]
    InvalidStatus(String),
    #[error("{0}")]
    Other(String),
}

impl ReconcileError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Client(err) => err.is_not_found(),
            Self::Resource(err) => err.is_not_found(),
            Self::Registry(err) => err.is_not_found(),
            _ => false,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Client(err) if err.is_conflict())
    }
}
