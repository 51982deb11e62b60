/*
    errors.rs - Notifier error types

    Only errors with a system code can be reported to the consumer as a
    start failure; `system_code` is what the callback bridge uses to tell
    them apart from everything else.
*/

use super::state::NotifierState;
use crate::changes::ChangeError;
use crate::config::ConfigError;
use crate::engine::EngineError;
use std::time::Duration;
use thiserror::Error;

/// Error code reported when the initial download times out
pub const ETIMEDOUT: i32 = 110;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NotifierError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Sync engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Inconsistent change notification: {0}")]
    Change(#[from] ChangeError),

    #[error("Initial download did not complete within {0:?}")]
    DownloadTimeout(Duration),

    #[error("Notifier already started")]
    AlreadyStarted,

    #[error("No tokio runtime available to run the notifier")]
    NoRuntime,

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: NotifierState, to: NotifierState },

    #[error("Notifier destroyed")]
    Destroyed,
}

impl NotifierError {
    /// OS-style error code and message, if this error carries one
    pub fn system_error(&self) -> Option<(i32, String)> {
        match self {
            NotifierError::Engine(EngineError::System { code, message }) => {
                Some((*code, message.clone()))
            }
            NotifierError::DownloadTimeout(_) => Some((ETIMEDOUT, self.to_string())),
            _ => None,
        }
    }

    pub fn system_code(&self) -> Option<i32> {
        self.system_error().map(|(code, _)| code)
    }
}

pub type NotifierResult<T> = Result<T, NotifierError>;
