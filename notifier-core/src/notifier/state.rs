//! Notifier lifecycle state machine
//!
//! ```text
//! Created -> Downloading -> Ready <-> Delivering
//!                 |           |           |
//!                 +-----------+-----------+--> Errored
//! ```

use super::errors::{NotifierError, NotifierResult};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifierState {
    /// Watch registered, worker not running
    Created,
    /// Worker running, initial download in progress
    Downloading,
    /// Initial download done, idle
    Ready,
    /// Handing queued notifications to the consumer
    Delivering,
    /// Terminal
    Errored,
}

impl NotifierState {
    pub fn can_transition_to(self, next: NotifierState) -> bool {
        use NotifierState::*;
        matches!(
            (self, next),
            (Created, Downloading)
                | (Downloading, Ready)
                | (Ready, Delivering)
                | (Delivering, Ready)
                | (Downloading | Ready | Delivering, Errored)
        )
    }

    /// Initial download finished and no error since
    pub fn is_synced(self) -> bool {
        matches!(self, NotifierState::Ready | NotifierState::Delivering)
    }

    pub fn is_terminal(self) -> bool {
        self == NotifierState::Errored
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NotifierState::Created => "created",
            NotifierState::Downloading => "downloading",
            NotifierState::Ready => "ready",
            NotifierState::Delivering => "delivering",
            NotifierState::Errored => "errored",
        }
    }
}

impl fmt::Display for NotifierState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared, checked state holder
#[derive(Debug)]
pub struct StateCell {
    state: Mutex<NotifierState>,
}

impl StateCell {
    pub fn new() -> Self {
        StateCell { state: Mutex::new(NotifierState::Created) }
    }

    fn lock(&self) -> MutexGuard<'_, NotifierState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self) -> NotifierState {
        *self.lock()
    }

    /// Move to `next`, returning the state left behind
    pub fn transition(&self, next: NotifierState) -> NotifierResult<NotifierState> {
        let mut state = self.lock();
        let from = *state;
        if !from.can_transition_to(next) {
            return Err(NotifierError::InvalidTransition { from, to: next });
        }
        *state = next;
        Ok(from)
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
