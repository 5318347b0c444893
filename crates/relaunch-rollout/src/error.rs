//! Rollout error types.

use thiserror::Error;

/// Errors that abort an invocation.
#[derive(Debug, Error)]
pub enum RolloutError {
    #[error("cloud call failed: {0}")]
    Cloud(#[from] relaunch_core::CloudError),

    #[error(transparent)]
    Core(#[from] relaunch_core::CoreError),
}

pub type RolloutResult<T> = Result<T, RolloutError>;
