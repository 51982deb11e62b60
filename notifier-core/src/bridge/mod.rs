/*
    bridge - Boundary between the notifier core and its consumer

    The consumer implements NotifierCallbacks and talks to the core only
    through a Bridge and the integer handles it hands out:

    1. create_notifier          -> NotifierHandle, worker started
    2. should_handle(path)      <- once per store
    3. on_start(0, "")          <- initial download done (or code, message)
    4. enqueue_calculation      <- one NotificationHandle per commit
    5. notification_get_changes -> on_calculation_complete(flattened, token)
    6. destroy_notification / destroy_snapshot / destroy_notifier
*/

pub mod api;
pub mod callbacks;
pub mod errors;
pub mod marshal;

pub use api::{Bridge, NotificationHandle, NotifierHandle, RawNotifierConfig, SnapshotHandle};
pub use callbacks::{ConsumerToken, FatalError, NotifierCallbacks, PendingNotification};
pub use errors::{BridgeError, BridgeResult};
pub use marshal::{
    ChangeBuffers, DeliveredChangeSet, DeliveredNotification, FlattenedChangeSet, FlattenedNotification,
};
