/*
    notification.rs - One committed transition of one store

    Construction is cheap: the notification only holds the two snapshot
    references. The per-collection diff runs on the first call to
    `get_changes` and is cached afterwards.
*/

use super::changeset::ChangeSet;
use super::errors::{ChangeError, ChangeResult};
use crate::metrics::{self, Timer, CHANGES_COMPUTED, CHANGES_DURATION_MS};
use crate::store::SharedSnapshot;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// Changes keyed by collection name, in name order
pub type CollectionChanges = BTreeMap<String, ChangeSet>;

/// A store moving from `previous` to `current`
#[derive(Debug)]
pub struct ChangeNotification {
    realm_path: String,
    previous: Option<SharedSnapshot>,
    current: SharedSnapshot,
    changes: OnceLock<CollectionChanges>,
}

impl ChangeNotification {
    /// Build a notification, checking that both snapshots describe
    /// consecutive states of the same store.
    pub fn new(previous: Option<SharedSnapshot>, current: SharedSnapshot) -> ChangeResult<Self> {
        if let Some(previous) = &previous {
            if !previous.is_same_store(&current) {
                return Err(ChangeError::StoreMismatch {
                    previous: previous.path().to_string(),
                    current: current.path().to_string(),
                });
            }
            if previous.version() >= current.version() {
                return Err(ChangeError::VersionNotAdvanced {
                    path: current.path().to_string(),
                    previous: previous.version(),
                    current: current.version(),
                });
            }
        }

        Ok(ChangeNotification {
            realm_path: current.path().to_string(),
            previous,
            current,
            changes: OnceLock::new(),
        })
    }

    /// Logical path of the store
    pub fn realm_path(&self) -> &str {
        &self.realm_path
    }

    /// Snapshot before the transition; `None` for the first observed version
    pub fn get_old_snapshot(&self) -> Option<&SharedSnapshot> {
        self.previous.as_ref()
    }

    pub fn get_new_snapshot(&self) -> &SharedSnapshot {
        &self.current
    }

    pub fn is_first_version(&self) -> bool {
        self.previous.is_none()
    }

    /// Per-collection changes, computed on first use
    pub fn get_changes(&self) -> &CollectionChanges {
        self.changes.get_or_init(|| {
            let timer = Timer::new(CHANGES_DURATION_MS);
            let changes = self.compute_changes();
            timer.stop();
            metrics::record_counter(CHANGES_COMPUTED, 1);
            changes
        })
    }

    pub fn changes_computed(&self) -> bool {
        self.changes.get().is_some()
    }

    /// Diff every collection present in either snapshot.
    ///
    /// Pure: no caching, safe to call repeatedly. Collections without
    /// changes are left out.
    pub fn compute_changes(&self) -> CollectionChanges {
        let previous = self.previous.as_deref();

        let names: BTreeSet<&str> = self
            .current
            .collection_names()
            .chain(previous.into_iter().flat_map(|s| s.collection_names()))
            .collect();

        names
            .into_iter()
            .filter_map(|name| {
                let changes = ChangeSet::between(
                    previous.and_then(|s| s.collection(name)),
                    self.current.collection(name),
                );
                (!changes.is_empty()).then(|| (name.to_string(), changes))
            })
            .collect()
    }
}
