/*
    admission.rs - Per-store admission decisions

    The admission predicate runs exactly once per store appearance. The
    answer is cached until the engine reports the store as removed; a store
    that shows up again afterwards is asked about again.

    For admitted stores the cache also remembers the last snapshot handed
    out, which becomes the `previous` side of the next notification.
*/

use crate::metrics::{self, STORES_ADMITTED, STORES_REJECTED};
use crate::store::{SharedSnapshot, Snapshot};
use std::collections::HashMap;
use tracing::debug;

struct StoreEntry {
    admitted: bool,
    last: Option<SharedSnapshot>,
}

/// Outcome of observing a committed snapshot
#[derive(Debug)]
pub enum Admission {
    /// Store is not observed
    Rejected,
    /// Store is observed; `previous` is the last snapshot seen for it
    Admitted { previous: Option<SharedSnapshot> },
}

#[derive(Default)]
pub struct AdmissionCache {
    stores: HashMap<String, StoreEntry>,
}

impl AdmissionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a committed snapshot, asking `admit` if the store is new
    pub fn observe<F>(&mut self, snapshot: &SharedSnapshot, admit: F) -> Admission
    where
        F: FnOnce(&Snapshot) -> bool,
    {
        let entry = self.stores.entry(snapshot.path().to_string()).or_insert_with(|| {
            let admitted = admit(snapshot);
            debug!(path = snapshot.path(), admitted, "admission decided");
            metrics::record_counter(if admitted { STORES_ADMITTED } else { STORES_REJECTED }, 1);
            StoreEntry { admitted, last: None }
        });

        if !entry.admitted {
            return Admission::Rejected;
        }

        Admission::Admitted { previous: entry.last.replace(snapshot.clone()) }
    }

    /// Drop everything known about a store
    pub fn forget(&mut self, path: &str) -> bool {
        self.stores.remove(path).is_some()
    }

    pub fn decision(&self, path: &str) -> Option<bool> {
        self.stores.get(path).map(|entry| entry.admitted)
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}
