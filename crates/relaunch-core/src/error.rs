//! Error types shared across relaunch crates.

use thiserror::Error;

use crate::cloud::Operation;

/// Result type alias for model construction and config loading.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type alias for collaborator calls.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors raised while building or loading domain values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid group {name}: {reason}")]
    InvalidGroup { name: String, reason: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A collaborator call that did not report definite success.
///
/// Any of these aborts the current invocation. Nothing is retried in
/// place; the next invocation starts again from a fresh snapshot.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("{operation} failed: {message}")]
    Request {
        operation: Operation,
        message: String,
    },

    #[error("{operation} returned unexpected status {status}")]
    UnexpectedStatus { operation: Operation, status: u16 },

    #[error("{operation}: not found: {what}")]
    NotFound { operation: Operation, what: String },
}

impl CloudError {
    /// The collaborator operation that failed.
    pub fn operation(&self) -> Operation {
        match self {
            CloudError::Request { operation, .. }
            | CloudError::UnexpectedStatus { operation, .. }
            | CloudError::NotFound { operation, .. } => *operation,
        }
    }
}
