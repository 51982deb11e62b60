//! Recording fakes for both callback interfaces

use crate::bridge::{
    ConsumerToken, DeliveredNotification, FatalError, FlattenedNotification, NotificationHandle,
    NotifierCallbacks,
};
use crate::changes::ChangeNotification;
use crate::notifier::{GlobalNotifier, NotifierCallback, NotifierError};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// What a drained notification looked like
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drained {
    pub path: String,
    pub previous_version: Option<u64>,
    pub version: u64,
}

#[derive(Default)]
struct NotifierRecord {
    download_completions: usize,
    errors: Vec<NotifierError>,
    offered: Vec<String>,
    drained: Vec<ChangeNotification>,
}

/// NotifierCallback that drains every notification it is told about
#[derive(Default)]
pub struct RecordingNotifierCallback {
    rejected: HashSet<String>,
    record: Mutex<NotifierRecord>,
}

impl RecordingNotifierCallback {
    pub fn admitting_all() -> Self {
        Self::default()
    }

    pub fn rejecting(paths: &[&str]) -> Self {
        Self { rejected: paths.iter().map(|p| p.to_string()).collect(), ..Self::default() }
    }

    pub fn download_completions(&self) -> usize {
        lock(&self.record).download_completions
    }

    pub fn errors(&self) -> Vec<NotifierError> {
        lock(&self.record).errors.clone()
    }

    /// Virtual paths offered to the admission predicate, in order
    pub fn offered(&self) -> Vec<String> {
        lock(&self.record).offered.clone()
    }

    pub fn delivered(&self) -> Vec<Drained> {
        lock(&self.record)
            .drained
            .iter()
            .map(|n| Drained {
                path: n.realm_path().to_string(),
                previous_version: n.get_old_snapshot().map(|s| s.version()),
                version: n.get_new_snapshot().version(),
            })
            .collect()
    }

    pub fn take_delivered(&self) -> Vec<ChangeNotification> {
        std::mem::take(&mut lock(&self.record).drained)
    }
}

impl NotifierCallback for RecordingNotifierCallback {
    fn download_complete(&self) {
        lock(&self.record).download_completions += 1;
    }

    fn error(&self, error: NotifierError) {
        lock(&self.record).errors.push(error);
    }

    fn realm_available(&self, _path_on_disk: &Path, virtual_path: &str) -> bool {
        lock(&self.record).offered.push(virtual_path.to_string());
        !self.rejected.contains(virtual_path)
    }

    fn realm_changed(&self, notifier: &GlobalNotifier) {
        while let Some(notification) = notifier.next_changed_realm() {
            lock(&self.record).drained.push(notification);
        }
    }
}

#[derive(Default)]
struct ConsumerRecord {
    offered: Vec<String>,
    enqueued: Vec<(String, NotificationHandle)>,
    starts: Vec<(i32, String)>,
    completed: Vec<(DeliveredNotification, ConsumerToken)>,
    fatal: Vec<FatalError>,
}

/// NotifierCallbacks fake. Records every call and never aborts on fatal
/// errors.
#[derive(Default)]
pub struct RecordingCallbacks {
    rejected: HashSet<String>,
    panicking: HashSet<String>,
    panic_on_complete: bool,
    record: Mutex<ConsumerRecord>,
}

impl RecordingCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(mut self, paths: &[&str]) -> Self {
        self.rejected.extend(paths.iter().map(|p| p.to_string()));
        self
    }

    /// Panic inside `should_handle` for `path`
    pub fn panicking_on(mut self, path: &str) -> Self {
        self.panicking.insert(path.to_string());
        self
    }

    /// Panic inside `on_calculation_complete`
    pub fn panicking_on_complete(mut self) -> Self {
        self.panic_on_complete = true;
        self
    }

    pub fn offered(&self) -> Vec<String> {
        lock(&self.record).offered.clone()
    }

    pub fn enqueued(&self) -> Vec<(String, NotificationHandle)> {
        lock(&self.record).enqueued.clone()
    }

    pub fn starts(&self) -> Vec<(i32, String)> {
        lock(&self.record).starts.clone()
    }

    pub fn completed(&self) -> Vec<(DeliveredNotification, ConsumerToken)> {
        lock(&self.record).completed.clone()
    }

    pub fn fatal_errors(&self) -> Vec<FatalError> {
        lock(&self.record).fatal.clone()
    }
}

impl NotifierCallbacks for RecordingCallbacks {
    fn should_handle(&self, path: &str) -> bool {
        lock(&self.record).offered.push(path.to_string());
        if self.panicking.contains(path) {
            panic!("should_handle exploded on {}", path);
        }
        !self.rejected.contains(path)
    }

    fn enqueue_calculation(&self, path: &str, notification: NotificationHandle) {
        lock(&self.record).enqueued.push((path.to_string(), notification));
    }

    fn on_start(&self, error_code: i32, message: &str) {
        lock(&self.record).starts.push((error_code, message.to_string()));
    }

    fn on_calculation_complete(&self, notification: &FlattenedNotification<'_>, token: ConsumerToken) {
        if self.panic_on_complete {
            panic!("on_calculation_complete exploded");
        }
        lock(&self.record).completed.push((notification.to_delivered(), token));
    }

    fn on_fatal_error(&self, error: &FatalError) {
        lock(&self.record).fatal.push(error.clone());
    }
}
