//! relaunch-health — instance classification for replacement decisions.
//!
//! Health checking itself is the provider's job. This crate only reads
//! what the group, its load balancers, and its target groups already
//! report, and folds it into one status per instance.
//!
//! # Components
//!
//! - **`classifier`** — `CompositeStatus`, `HealthIndex`, `classify()`
//! - **`snapshot`** — `Snapshot` (classified group) and composable `InstanceSet` filters

pub mod classifier;
pub mod snapshot;

pub use classifier::{classify, CompositeStatus, HealthIndex, READY_STATUS};
pub use snapshot::{InstanceSet, Snapshot};
