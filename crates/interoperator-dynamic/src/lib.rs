//!
//! # Untyped resource handling
//!
//! Rendered templates are turned into generic resource trees here, and live
//! objects are merged with their expected shape.
//!
//! Trees are `serde_json::Value`: a mapping / sequence / scalar tagged value with
//! string keys only. YAML input is normalized into that form first.
//!

mod error;
mod manifest;
mod merge;

pub use error::DynamicError;
pub use manifest::{parse_manifest, normalize_keys};
pub use merge::deep_merge;

pub use serde_json::Value;
