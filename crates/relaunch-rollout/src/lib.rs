//! relaunch-rollout — rolling replacement of outdated group instances.
//!
//! Each invocation re-reads a group, decides which single step of the
//! replacement it has reached, performs it, and returns. Nothing is
//! carried over between invocations, so overlapping or repeated calls
//! re-derive the same decision from live state.
//!
//! # Components
//!
//! - **`controller`** — Rollout state machine (`RolloutController`, `Decision`)
//! - **`dispatcher`** — Maps an incoming event to the groups to reconcile

pub mod controller;
pub mod dispatcher;
pub mod error;

pub use controller::{suspend_required, Action, Decision, RolloutController, RolloutPhase};
pub use dispatcher::{Dispatcher, Event, EventDetail, Target};
pub use error::{RolloutError, RolloutResult};
