//! Callback interface between a notifier and whatever drives it

use super::errors::NotifierError;
use super::global::GlobalNotifier;
use std::path::Path;

/// Receives everything a `GlobalNotifier` reports.
///
/// All methods are invoked synchronously from the notifier's worker task
/// and block it until they return, so implementations should hand work off
/// rather than do it inline.
pub trait NotifierCallback: Send + Sync {
    /// Initial download finished. Called at most once.
    fn download_complete(&self);

    /// The notifier failed and stopped. Called at most once, after which
    /// nothing else is delivered.
    fn error(&self, error: NotifierError);

    /// Decide whether a newly seen store should be observed
    fn realm_available(&self, path_on_disk: &Path, virtual_path: &str) -> bool;

    /// Notifications are waiting; drain them with `next_changed_realm`
    fn realm_changed(&self, notifier: &GlobalNotifier);
}
