/*
    engine - Interface to the synchronization engine

    The engine moves data between server and local replicas and resolves
    conflicts; none of that happens here. The notifier only needs:
    - a watch over a working directory that streams EngineEvents
    - a way to open the latest state of a store for writing

    Flow:
    1. Notifier calls `watch` during creation and keeps the receiver
    2. Engine reports every store it knows about through `Committed`
       (this is the initial download), then `DownloadComplete`
    3. Each later local commit produces another `Committed`
    4. `unwatch` on destroy
*/

pub mod errors;
pub mod memory;

pub use errors::{EngineError, EngineResult};
pub use memory::MemoryEngine;

use crate::config::SyncConfig;
use crate::store::{SharedSnapshot, StoreInfo};
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Channel the engine pushes events into
pub type EventSender = mpsc::UnboundedSender<EngineEvent>;

/// Receiving side held by a notifier
pub type EventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Identifier of an active watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Events a watch produces
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A transaction was committed; carries the new snapshot
    Committed(SharedSnapshot),

    /// Store disappeared from the server
    StoreRemoved(String),

    /// Initial download finished
    DownloadComplete,

    /// Engine failure
    Error(EngineError),
}

/// Parameters of a watch
#[derive(Debug, Clone)]
pub struct WatchRequest {
    /// Directory the engine keeps its replicas under
    pub working_directory: PathBuf,

    /// Server and session settings
    pub sync: SyncConfig,
}

/// Sync engine as seen by the notifier
pub trait SyncEngine: Send + Sync {
    /// Start watching. Events are pushed into `events` until `unwatch`.
    fn watch(&self, request: WatchRequest, events: EventSender) -> EngineResult<WatchId>;

    /// Stop a watch; unknown ids are ignored
    fn unwatch(&self, id: WatchId);

    /// Open the current state of a store for writing
    fn open_for_writing(&self, store: &StoreInfo) -> EngineResult<SharedSnapshot>;
}
