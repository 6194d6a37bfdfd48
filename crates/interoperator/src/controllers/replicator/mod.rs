//!
//! # Replicators
//!
//! Keep the master cluster and the sister clusters in sync: the catalog flows
//! down to every sister, instances flow down to the cluster they are placed
//! on and their progress flows back up.
//!

mod catalog;
mod instance;

pub use catalog::{CatalogReplicator, catalog_mapper};
pub use instance::InstanceReplicator;

pub const SERVICE_REPLICATOR: &str = "service_replicator";
pub const PLAN_REPLICATOR: &str = "plan_replicator";
pub const INSTANCE_REPLICATOR: &str = "instance_replicator";
