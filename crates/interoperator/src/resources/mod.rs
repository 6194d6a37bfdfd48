//!
//! # Resource manager
//!
//! Renders the infrastructure a plan needs, applies it to a cluster,
//! reads back its status and tears it down again.
//!

mod apply;
mod manager;
pub mod status;
pub mod template;

pub use apply::{Applied, apply, merge_patch};
pub use manager::DefaultResourceManager;
pub use status::{OperationStatus, Status};
pub use template::{HandlebarsRenderer, RenderError, TemplateRenderer};

use std::fmt::Debug;

use async_trait::async_trait;

use interoperator_dynamic::DynamicError;
use interoperator_metadata::{ConvertError, DynamicObject, ResourceClient, ResourceRef};
use interoperator_metadata::client::ClientError;

pub const PROVISION_ACTION: &str = "provision";
pub const DEPROVISION_ACTION: &str = "deprovision";
pub const BIND_ACTION: &str = "bind";
pub const UNBIND_ACTION: &str = "unbind";
/// template listing the objects the status template reads
pub const SOURCES_ACTION: &str = "sources";
pub const STATUS_ACTION: &str = "status";

#[derive(thiserror::Error, Debug)]
pub enum ResourceError {
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("rendered manifest: {0}")]
    Manifest(#[from] DynamicError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error("rendered status: {0}")]
    Status(#[from] serde_yaml::Error),
    #[error("object tree: {0}")]
    Json(#[from] serde_json::Error),
}

impl ResourceError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Client(err) => err.is_not_found(),
            _ => false,
        }
    }
}

/// identifies what to render: instance, optional binding, catalog entries and action
#[derive(Debug, Clone, Copy)]
pub struct ResourceRequest<'a> {
    pub instance_id: &'a str,
    /// empty for instance operations
    pub binding_id: &'a str,
    pub service_id: &'a str,
    pub plan_id: &'a str,
    pub action: &'a str,
    pub namespace: &'a str,
}

#[async_trait]
pub trait ResourceManager: Send + Sync + Debug {
    /// render the action template of the plan into resources
    async fn compute_expected_resources(
        &self,
        client: &dyn ResourceClient,
        request: ResourceRequest<'_>,
    ) -> Result<Vec<DynamicObject>, ResourceError>;

    /// make owner the controller of every namespaced resource
    fn set_owner_reference(&self, owner: &DynamicObject, resources: &mut [DynamicObject]);

    /// create or merge every resource into target.
    /// Returns previous references followed by the newly applied ones.
    async fn reconcile_resources(
        &self,
        target: &dyn ResourceClient,
        expected: Vec<DynamicObject>,
        previous: &[ResourceRef],
    ) -> Result<Vec<ResourceRef>, ResourceError>;

    /// render the status template against the live source objects
    async fn compute_status(
        &self,
        client: &dyn ResourceClient,
        target: &dyn ResourceClient,
        request: ResourceRequest<'_>,
    ) -> Result<Status, ResourceError>;

    /// delete every reference, returns the ones still present
    async fn delete_sub_resources(
        &self,
        target: &dyn ResourceClient,
        resources: &[ResourceRef],
    ) -> Result<Vec<ResourceRef>, ResourceError>;
}
