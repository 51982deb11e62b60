//! Errors raised while pairing snapshots into a notification

use thiserror::Error;

/// A snapshot pair that cannot describe a single transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangeError {
    #[error("Snapshots belong to different stores: {previous} vs {current}")]
    StoreMismatch { previous: String, current: String },

    #[error("Version did not advance for {path}: {previous} -> {current}")]
    VersionNotAdvanced { path: String, previous: u64, current: u64 },
}

pub type ChangeResult<T> = Result<T, ChangeError>;
