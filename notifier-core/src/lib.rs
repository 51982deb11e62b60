//! Global change-notification multiplexer
//!
//! Watches every store a sync engine replicates under a working directory,
//! lets a consumer choose which stores to observe, and turns each committed
//! transaction into a lazily computed, per-collection change set handed to
//! the consumer through explicit, handle-based callbacks.
//!
//! - [`store`]: immutable snapshots and write transactions
//! - [`changes`]: index sets, change sets and change notifications
//! - [`engine`]: the sync engine interface and an in-memory engine
//! - [`notifier`]: the multiplexer itself
//! - [`bridge`]: handle tables and consumer callbacks
//! - [`config`], [`logging`], [`metrics`]: ambient plumbing

pub mod bridge;
pub mod changes;
pub mod config;
pub mod engine;
pub mod handles;
pub mod logging;
pub mod metrics;
pub mod notifier;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use bridge::{Bridge, BridgeError, FatalError, NotifierCallbacks};
pub use changes::{ChangeNotification, ChangeSet, IndexSet};
pub use config::NotifierConfig;
pub use engine::{MemoryEngine, SyncEngine};
pub use logging::{init_logging, LogLevel};
pub use notifier::{GlobalNotifier, NotifierCallback, NotifierError, NotifierState};
