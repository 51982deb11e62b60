/*
    marshal.rs - Flattened transport form of a change notification

    Every index set is flattened into an explicit ascending Vec<usize>
    owned by ChangeBuffers. The Flattened* views borrow from those buffers
    and from the notification itself, so they only live for the duration
    of a single `on_calculation_complete` call. Consumers that need the
    data afterwards copy it out, e.g. with `FlattenedNotification::to_delivered`.
*/

use super::api::SnapshotHandle;
use super::errors::{BridgeError, BridgeResult};
use crate::changes::CollectionChanges;
use std::path::{Path, PathBuf};

/// One collection's changes, borrowed for one callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlattenedChangeSet<'a> {
    pub collection: &'a str,
    pub deletions: &'a [usize],
    pub insertions: &'a [usize],
    pub previous_modifications: &'a [usize],
    pub current_modifications: &'a [usize],
}

/// Notification envelope, borrowed for one callback
#[derive(Debug, Clone, Copy)]
pub struct FlattenedNotification<'a> {
    pub path: &'a str,
    pub path_on_disk: &'a Path,
    /// `None` for the first observed version of a store
    pub previous: Option<SnapshotHandle>,
    pub current: SnapshotHandle,
    pub changesets: &'a [FlattenedChangeSet<'a>],
}

/// Owned copy of a changeset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredChangeSet {
    pub collection: String,
    pub deletions: Vec<usize>,
    pub insertions: Vec<usize>,
    pub previous_modifications: Vec<usize>,
    pub current_modifications: Vec<usize>,
}

/// Owned copy of a notification envelope
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredNotification {
    pub path: String,
    pub path_on_disk: PathBuf,
    pub previous: Option<SnapshotHandle>,
    pub current: SnapshotHandle,
    pub changesets: Vec<DeliveredChangeSet>,
}

impl FlattenedChangeSet<'_> {
    pub fn to_delivered(&self) -> DeliveredChangeSet {
        DeliveredChangeSet {
            collection: self.collection.to_string(),
            deletions: self.deletions.to_vec(),
            insertions: self.insertions.to_vec(),
            previous_modifications: self.previous_modifications.to_vec(),
            current_modifications: self.current_modifications.to_vec(),
        }
    }
}

impl FlattenedNotification<'_> {
    pub fn to_delivered(&self) -> DeliveredNotification {
        DeliveredNotification {
            path: self.path.to_string(),
            path_on_disk: self.path_on_disk.to_path_buf(),
            previous: self.previous,
            current: self.current,
            changesets: self.changesets.iter().map(FlattenedChangeSet::to_delivered).collect(),
        }
    }

    pub fn changeset(&self, collection: &str) -> Option<&FlattenedChangeSet<'_>> {
        self.changesets.iter().find(|c| c.collection == collection)
    }
}

impl DeliveredNotification {
    pub fn changeset(&self, collection: &str) -> Option<&DeliveredChangeSet> {
        self.changesets.iter().find(|c| c.collection == collection)
    }
}

struct CollectionBuffers<'a> {
    collection: &'a str,
    deletions: Vec<usize>,
    insertions: Vec<usize>,
    previous_modifications: Vec<usize>,
    current_modifications: Vec<usize>,
}

/// Backing storage for the flattened index arrays of one delivery
pub struct ChangeBuffers<'a> {
    collections: Vec<CollectionBuffers<'a>>,
}

impl<'a> ChangeBuffers<'a> {
    pub fn new(changes: &'a CollectionChanges) -> Self {
        let collections = changes
            .iter()
            .map(|(name, changes)| CollectionBuffers {
                collection: name.as_str(),
                deletions: changes.deletions.flatten(),
                insertions: changes.insertions.flatten(),
                previous_modifications: changes.modifications.flatten(),
                current_modifications: changes.modifications_new.flatten(),
            })
            .collect();
        ChangeBuffers { collections }
    }

    pub fn changesets(&self) -> Vec<FlattenedChangeSet<'_>> {
        self.collections
            .iter()
            .map(|c| FlattenedChangeSet {
                collection: c.collection,
                deletions: &c.deletions,
                insertions: &c.insertions,
                previous_modifications: &c.previous_modifications,
                current_modifications: &c.current_modifications,
            })
            .collect()
    }
}

/// Decode a raw UTF-8 buffer coming from the consumer
pub fn utf8<'a>(field: &'static str, bytes: &'a [u8]) -> BridgeResult<&'a str> {
    std::str::from_utf8(bytes)
        .map_err(|e| BridgeError::Marshalling { field, reason: e.to_string() })
}
