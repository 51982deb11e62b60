/*
    errors.rs - Errors reported by the sync engine

    System errors carry an OS-style error code and are the only kind the
    notifier can report back to the consumer as a start failure. Anything
    else is treated as an unhandled error type.
*/

use thiserror::Error;

/// Errors surfaced by a sync engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Transport or system failure with an error code
    #[error("{message} (code {code})")]
    System { code: i32, message: String },

    /// Store is not known to the engine
    #[error("Store not found: {0}")]
    StoreNotFound(String),

    /// Watch request was rejected
    #[error("Watch rejected: {0}")]
    WatchRejected(String),

    /// Engine shut down
    #[error("Engine closed")]
    Closed,

    /// Any other internal failure
    #[error("Internal engine error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn system(code: i32, message: impl Into<String>) -> Self {
        EngineError::System { code, message: message.into() }
    }

    /// Error code for system errors, `None` for every other kind
    pub fn system_code(&self) -> Option<i32> {
        match self {
            EngineError::System { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
