/*
    callbacks.rs - Consumer-facing callbacks and the adapter that drives them

    ManagedCallback sits between a GlobalNotifier and the consumer's
    NotifierCallbacks:

    - realm_available  -> should_handle(virtual path)
    - realm_changed    -> drain next_changed_realm, enqueue_calculation per item
    - download_complete-> on_start(0, "")
    - error before the initial download, with a system code
                       -> on_start(code, message)
    - any other error  -> on_fatal_error

    on_start fires at most once per notifier. Panics raised by consumer
    callbacks are contained here and never unwind into the worker.
*/

use super::api::NotificationHandle;
use super::errors::BridgeError;
use super::marshal::FlattenedNotification;
use crate::changes::ChangeNotification;
use crate::handles::HandleTable;
use crate::notifier::{GlobalNotifier, NotifierCallback, NotifierError};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, trace, warn};

/// Opaque value the consumer passes through `notification_get_changes`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerToken(pub u64);

/// Errors the notifier cannot recover from
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FatalError {
    /// Failure after the initial download completed
    #[error("Unhandled GlobalNotifier runtime error: {0}")]
    Runtime(NotifierError),

    /// Failure before the initial download that carries no error code
    #[error("Unhandled GlobalNotifier error type: {0}")]
    UnhandledErrorType(NotifierError),
}

/// Callbacks implemented by the consumer of a notifier.
///
/// All of them run on the notifier's worker, except
/// `on_calculation_complete` which runs on whichever thread called
/// `Bridge::notification_get_changes`.
pub trait NotifierCallbacks: Send + Sync {
    /// Should the store at `path` be observed
    fn should_handle(&self, path: &str) -> bool;

    /// Take ownership of a notification; destroy it with
    /// `Bridge::destroy_notification` when done
    fn enqueue_calculation(&self, path: &str, notification: NotificationHandle);

    /// Start outcome: 0 once the initial download completed, otherwise
    /// the error code and message of the failure
    fn on_start(&self, error_code: i32, message: &str);

    /// Flattened changes of a notification. The borrowed data is only
    /// valid until this call returns.
    fn on_calculation_complete(&self, notification: &FlattenedNotification<'_>, token: ConsumerToken);

    /// The notifier hit an error it cannot recover from. It has stopped
    /// and will deliver nothing else. The default logs and aborts.
    fn on_fatal_error(&self, error: &FatalError) {
        error!(error = %error, "fatal notifier error");
        std::process::abort();
    }
}

/// A notification handed to the consumer, with the callbacks that
/// will receive its changes
pub struct PendingNotification {
    pub(crate) change: ChangeNotification,
    pub(crate) callbacks: Arc<dyn NotifierCallbacks>,
}

impl PendingNotification {
    pub fn change(&self) -> &ChangeNotification {
        &self.change
    }
}

/// Run a consumer callback, containing any panic
pub(crate) fn guard<R>(callback: &'static str, f: impl FnOnce() -> R) -> Result<R, BridgeError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|_| {
        error!(callback, "consumer callback panicked");
        BridgeError::CallbackPanicked(callback)
    })
}

/// Adapts NotifierCallbacks to the notifier's callback interface
pub(crate) struct ManagedCallback {
    callbacks: Arc<dyn NotifierCallbacks>,
    notifications: Arc<HandleTable<PendingNotification>>,
    did_download: AtomicBool,
    start_reported: AtomicBool,
}

impl ManagedCallback {
    pub(crate) fn new(
        callbacks: Arc<dyn NotifierCallbacks>,
        notifications: Arc<HandleTable<PendingNotification>>,
    ) -> Self {
        ManagedCallback {
            callbacks,
            notifications,
            did_download: AtomicBool::new(false),
            start_reported: AtomicBool::new(false),
        }
    }

    fn report_start(&self, code: i32, message: &str) {
        if self.start_reported.swap(true, Ordering::SeqCst) {
            warn!(code, message, "start outcome already reported");
            return;
        }
        let _ = guard("on_start", || self.callbacks.on_start(code, message));
    }

    fn fatal(&self, error: FatalError) {
        error!(error = %error, "unrecoverable notifier error");
        let _ = guard("on_fatal_error", || self.callbacks.on_fatal_error(&error));
    }
}

impl NotifierCallback for ManagedCallback {
    fn download_complete(&self) {
        trace!("download_complete()");
        self.did_download.store(true, Ordering::SeqCst);
        self.report_start(0, "");
    }

    fn error(&self, error: NotifierError) {
        trace!("error()");
        if self.did_download.load(Ordering::SeqCst) {
            return self.fatal(FatalError::Runtime(error));
        }

        match error.system_error() {
            Some((code, message)) => self.report_start(code, &message),
            None => self.fatal(FatalError::UnhandledErrorType(error)),
        }
    }

    fn realm_available(&self, _path_on_disk: &Path, virtual_path: &str) -> bool {
        trace!(virtual_path, "realm_available()");
        guard("should_handle", || self.callbacks.should_handle(virtual_path)).unwrap_or(false)
    }

    fn realm_changed(&self, notifier: &GlobalNotifier) {
        trace!("realm_changed()");
        while let Some(change) = notifier.next_changed_realm() {
            let path = change.realm_path().to_string();
            let handle = self
                .notifications
                .insert(PendingNotification { change, callbacks: self.callbacks.clone() });

            if guard("enqueue_calculation", || self.callbacks.enqueue_calculation(&path, handle))
                .is_err()
            {
                let _ = self.notifications.remove(handle);
            }
        }
    }
}
