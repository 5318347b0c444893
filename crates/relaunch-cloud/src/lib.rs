//! relaunch-cloud — `CloudApi` implementations that run without a provider.
//!
//! - **`fleet`** — `Fleet`, a serializable picture of groups and their
//!   load balancer / target group health, loadable from a JSON world file
//! - **`memory`** — `MemoryCloud`, applies mutations to a `Fleet` and
//!   records every call; used as the fake collaborator in tests
//! - **`dry_run`** — `DryRun`, forwards describes and skips mutations

pub mod dry_run;
pub mod fleet;
pub mod memory;

pub use dry_run::DryRun;
pub use fleet::Fleet;
pub use memory::{CloudCall, MemoryCloud};
