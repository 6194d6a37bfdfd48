//!
//! # Interoperator resource model
//!
//! Object metadata, untyped and typed objects, the interoperator custom
//! resources and the resource api used to talk to a cluster.
//!

pub mod constants;
pub mod meta;
pub mod object;
pub mod client;
pub mod instance;
pub mod catalog;
pub mod cluster;
pub mod builtin;

pub use meta::{ObjectMeta, OwnerReference, TypeMeta, ResourceRef, ObjectKey};
pub use object::{Crd, CrdNames, Spec, DynamicObject, Object, ConvertError};
pub use client::{ResourceClient, SharedClient, WatchEvent, ClientError};
