#[macro_use]
pub mod config;
pub mod cli;
pub mod error;
pub mod registry;
pub mod resources;
pub mod runtime;
pub mod watch;
pub mod controllers;
pub mod start;

pub use error::ReconcileError;

pub mod metadata {
    pub use interoperator_metadata::*;
}
