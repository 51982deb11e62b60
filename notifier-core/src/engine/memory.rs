/*
    memory.rs - In-process sync engine

    Keeps every store as a chain of in-memory snapshots and fans committed
    transactions out to all active watches. Useful for local-only
    multiplexers and as the engine behind the test suite.

    Initial download semantics: a new watch immediately receives the current
    snapshot of every known store (in path order). `complete_download`
    then signals the end of the download phase to every watch.
*/

use super::{EngineError, EngineEvent, EngineResult, EventSender, SyncEngine, WatchId, WatchRequest};
use crate::store::{SharedSnapshot, Snapshot, StoreInfo, Transaction};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, trace};

#[derive(Default)]
struct MemoryState {
    stores: BTreeMap<String, SharedSnapshot>,
    watchers: HashMap<WatchId, EventSender>,
    next_watch: u64,
}

impl MemoryState {
    /// Send to every watch, dropping the ones whose receiver is gone
    fn broadcast(&mut self, event: EngineEvent) {
        self.watchers.retain(|id, tx| {
            let alive = tx.send(event.clone()).is_ok();
            if !alive {
                trace!("dropping closed watch {:?}", id);
            }
            alive
        });
    }
}

/// Sync engine backed by in-memory snapshots
pub struct MemoryEngine {
    data_dir: PathBuf,
    state: Mutex<MemoryState>,
}

impl MemoryEngine {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        MemoryEngine { data_dir: data_dir.into(), state: Mutex::new(MemoryState::default()) }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Where a store with the given logical path lives on disk
    pub fn store_info(&self, path: &str) -> StoreInfo {
        let file = format!("{}.realm", path.trim_start_matches('/'));
        StoreInfo::new(path, self.data_dir.join(file))
    }

    /// Run a write transaction against a store, opening it if needed.
    ///
    /// Returns the resulting snapshot. A transaction that changes nothing
    /// on an existing store is not committed and produces no event.
    pub fn commit<F>(&self, path: &str, write: F) -> EngineResult<SharedSnapshot>
    where
        F: FnOnce(&mut Transaction),
    {
        let mut state = self.lock();

        let existing = state.stores.get(path).cloned();
        let base = match &existing {
            Some(snapshot) => snapshot.clone(),
            None => Snapshot::empty(self.store_info(path)).into_shared(),
        };

        let mut tx = Transaction::begin(&base);
        write(&mut tx);

        if existing.is_some() && !tx.is_dirty() {
            return Ok(base);
        }

        let snapshot = tx.commit(&base).into_shared();
        debug!(path, version = snapshot.version(), "committed transaction");

        state.stores.insert(path.to_string(), snapshot.clone());
        state.broadcast(EngineEvent::Committed(snapshot.clone()));

        Ok(snapshot)
    }

    /// Remove a store; returns false if it did not exist
    pub fn remove_store(&self, path: &str) -> bool {
        let mut state = self.lock();
        if state.stores.remove(path).is_none() {
            return false;
        }
        state.broadcast(EngineEvent::StoreRemoved(path.to_string()));
        true
    }

    /// Signal the end of the initial download to every watch
    pub fn complete_download(&self) {
        self.lock().broadcast(EngineEvent::DownloadComplete);
    }

    /// Report an engine failure to every watch
    pub fn fail(&self, error: EngineError) {
        self.lock().broadcast(EngineEvent::Error(error));
    }

    pub fn snapshot(&self, path: &str) -> Option<SharedSnapshot> {
        self.lock().stores.get(path).cloned()
    }

    pub fn watcher_count(&self) -> usize {
        self.lock().watchers.len()
    }
}

impl SyncEngine for MemoryEngine {
    fn watch(&self, request: WatchRequest, events: EventSender) -> EngineResult<WatchId> {
        let mut state = self.lock();

        state.next_watch += 1;
        let id = WatchId(state.next_watch);

        for snapshot in state.stores.values() {
            events
                .send(EngineEvent::Committed(snapshot.clone()))
                .map_err(|_| EngineError::Closed)?;
        }

        debug!(
            watch = id.0,
            working_directory = %request.working_directory.display(),
            server = %request.sync.server_url,
            stores = state.stores.len(),
            "watch registered"
        );

        state.watchers.insert(id, events);
        Ok(id)
    }

    fn unwatch(&self, id: WatchId) {
        if self.lock().watchers.remove(&id).is_some() {
            debug!(watch = id.0, "watch removed");
        }
    }

    fn open_for_writing(&self, store: &StoreInfo) -> EngineResult<SharedSnapshot> {
        self.snapshot(&store.path).ok_or_else(|| EngineError::StoreNotFound(store.path.clone()))
    }
}
