//! relaunch-core — shared types for the instance replacement controller.
//!
//! Holds the typed view of an autoscaling group and its instances, the
//! [`CloudApi`] collaborator interface every other crate talks through,
//! the error taxonomy, and `relaunch.toml` parsing.

pub mod cloud;
pub mod config;
pub mod error;
pub mod types;

pub use cloud::{CloudApi, Operation};
pub use config::RelaunchConfig;
pub use error::{CloudError, CloudResult, CoreError, CoreResult};
pub use types::*;
