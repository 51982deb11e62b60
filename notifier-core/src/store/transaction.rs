/*
    transaction.rs - Write transactions against a store

    A transaction starts from the current snapshot's collections and
    produces the next snapshot on commit. Nothing is visible to readers
    until the engine publishes the new snapshot.
*/

use super::snapshot::{Collection, Row, Snapshot};
use std::collections::BTreeMap;

/// Pending writes on top of a base snapshot
#[derive(Debug)]
pub struct Transaction {
    collections: BTreeMap<String, Collection>,
    dirty: bool,
}

impl Transaction {
    pub fn begin(base: &Snapshot) -> Self {
        Transaction { collections: base.collections().clone(), dirty: false }
    }

    /// Create a collection if it does not exist yet
    pub fn create_collection(&mut self, name: &str) -> &mut Self {
        if !self.collections.contains_key(name) {
            self.collections.insert(name.to_string(), Collection::new());
            self.dirty = true;
        }
        self
    }

    pub fn drop_collection(&mut self, name: &str) -> &mut Self {
        if self.collections.remove(name).is_some() {
            self.dirty = true;
        }
        self
    }

    /// Insert or update a row; new keys are appended at the end
    pub fn upsert(&mut self, collection: &str, key: &str, value: serde_json::Value) -> &mut Self {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .upsert(Row::new(key, value));
        self.dirty = true;
        self
    }

    /// Insert a row at a specific position
    pub fn insert_at(
        &mut self,
        collection: &str,
        index: usize,
        key: &str,
        value: serde_json::Value,
    ) -> &mut Self {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert_at(index, Row::new(key, value));
        self.dirty = true;
        self
    }

    pub fn delete(&mut self, collection: &str, key: &str) -> &mut Self {
        if let Some(rows) = self.collections.get_mut(collection) {
            if rows.remove(key).is_some() {
                self.dirty = true;
            }
        }
        self
    }

    /// Whether the transaction changed anything
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Produce the next snapshot of the base store
    pub fn commit(self, base: &Snapshot) -> Snapshot {
        Snapshot::new(base.store().clone(), base.version() + 1, self.collections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreInfo;
    use serde_json::json;

    #[test]
    fn test_commit_bumps_version() {
        let base = Snapshot::empty(StoreInfo::new("/a", "/data/a"));
        let mut tx = Transaction::begin(&base);
        tx.upsert("people", "p1", json!({"name": "Ann"}));
        assert!(tx.is_dirty());

        let next = tx.commit(&base);
        assert_eq!(next.version(), 1);
        assert_eq!(next.collection("people").unwrap().len(), 1);
        // Base is untouched
        assert!(base.collection("people").is_none());
    }

    #[test]
    fn test_noop_transaction_is_clean() {
        let base = Snapshot::empty(StoreInfo::new("/a", "/data/a"));
        let mut tx = Transaction::begin(&base);
        tx.delete("people", "missing").drop_collection("missing");
        assert!(!tx.is_dirty());
    }

    #[test]
    fn test_collection_lifecycle() {
        let base = Snapshot::empty(StoreInfo::new("/a", "/data/a"));
        let mut tx = Transaction::begin(&base);
        tx.create_collection("tags").create_collection("tags");
        let with_tags = tx.commit(&base);
        assert!(with_tags.collection("tags").unwrap().is_empty());

        let mut tx = Transaction::begin(&with_tags);
        tx.drop_collection("tags");
        let without = tx.commit(&with_tags);
        assert_eq!(without.version(), 2);
        assert!(without.collection("tags").is_none());
    }
}
