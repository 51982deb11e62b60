//! Errors returned across the consumer boundary

use crate::config::ConfigError;
use crate::engine::EngineError;
use crate::handles::HandleError;
use crate::notifier::NotifierError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Raw input could not be decoded
    #[error("Malformed {field}: {reason}")]
    Marshalling { field: &'static str, reason: String },

    #[error(transparent)]
    Handle(#[from] HandleError),

    #[error("Sync engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Notifier error: {0}")]
    Notifier(NotifierError),

    /// A consumer callback panicked; the panic was contained
    #[error("Callback {0} panicked")]
    CallbackPanicked(&'static str),
}

impl From<NotifierError> for BridgeError {
    fn from(error: NotifierError) -> Self {
        match error {
            NotifierError::Config(e) => BridgeError::Config(e),
            NotifierError::Engine(e) => BridgeError::Engine(e),
            other => BridgeError::Notifier(other),
        }
    }
}

impl BridgeError {
    /// Stable nonzero code for the consumer. Engine system errors keep
    /// their own code.
    pub fn code(&self) -> i32 {
        match self {
            BridgeError::Config(_) => 1,
            BridgeError::Marshalling { .. } => 2,
            BridgeError::Handle(_) => 3,
            BridgeError::Engine(e) => e.system_code().filter(|code| *code != 0).unwrap_or(4),
            BridgeError::Notifier(_) => 5,
            BridgeError::CallbackPanicked(_) => 6,
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
