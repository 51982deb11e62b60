/*
    snapshot.rs - Immutable, versioned read views of a store

    A snapshot is what the sync engine hands the multiplexer after every
    committed transaction. It is never mutated after construction and is
    shared between the notifier, pending notifications and consumers via Arc.

    Layout:
    - StoreInfo: logical path (admission key) + physical on-disk path
    - Collection: ordered rows, positions are the coordinates used by diffs
    - Row: identity key + JSON value + content digest
*/

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared, reference-counted snapshot handle
pub type SharedSnapshot = Arc<Snapshot>;

/// Content digest of a row value
pub type RowDigest = [u8; 32];

/// Identity of a store as reported by the sync engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreInfo {
    /// Logical path, stable across restarts; used for admission
    pub path: String,

    /// Physical location of the replica on disk
    pub path_on_disk: PathBuf,
}

impl StoreInfo {
    pub fn new(path: impl Into<String>, path_on_disk: impl Into<PathBuf>) -> Self {
        StoreInfo { path: path.into(), path_on_disk: path_on_disk.into() }
    }
}

/// A single row inside a collection
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    key: String,
    value: serde_json::Value,
    digest: RowDigest,
}

impl Row {
    pub fn new(key: impl Into<String>, value: serde_json::Value) -> Self {
        let digest = *blake3::hash(value.to_string().as_bytes()).as_bytes();
        Row { key: key.into(), value, digest }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }

    pub fn digest(&self) -> &RowDigest {
        &self.digest
    }
}

/// Ordered rows of one named collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    rows: Vec<Row>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut collection = Collection::new();
        for row in rows {
            collection.upsert(row);
        }
        collection
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn get(&self, key: &str) -> Option<&Row> {
        self.rows.iter().find(|row| row.key == key)
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.rows.iter().position(|row| row.key == key)
    }

    /// Replace the row with the same key in place, or append it.
    /// Keys stay unique within a collection.
    pub fn upsert(&mut self, row: Row) {
        match self.position(&row.key) {
            Some(index) => self.rows[index] = row,
            None => self.rows.push(row),
        }
    }

    /// Insert a new row at `index`, shifting later rows.
    /// An existing row with the same key is removed first.
    pub fn insert_at(&mut self, index: usize, row: Row) {
        if let Some(existing) = self.position(&row.key) {
            self.rows.remove(existing);
        }
        let index = index.min(self.rows.len());
        self.rows.insert(index, row);
    }

    pub fn remove(&mut self, key: &str) -> Option<Row> {
        self.position(key).map(|index| self.rows.remove(index))
    }
}

/// Point-in-time view of a store at a transaction version
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    store: StoreInfo,
    version: u64,
    collections: BTreeMap<String, Collection>,
}

impl Snapshot {
    pub fn new(store: StoreInfo, version: u64, collections: BTreeMap<String, Collection>) -> Self {
        Snapshot { store, version, collections }
    }

    /// An empty snapshot, used as the base of a freshly opened store
    pub fn empty(store: StoreInfo) -> Self {
        Snapshot::new(store, 0, BTreeMap::new())
    }

    pub fn store(&self) -> &StoreInfo {
        &self.store
    }

    pub fn path(&self) -> &str {
        &self.store.path
    }

    pub fn path_on_disk(&self) -> &Path {
        &self.store.path_on_disk
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    pub fn collections(&self) -> &BTreeMap<String, Collection> {
        &self.collections
    }

    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn is_same_store(&self, other: &Snapshot) -> bool {
        self.store == other.store
    }

    pub fn into_shared(self) -> SharedSnapshot {
        Arc::new(self)
    }
}
