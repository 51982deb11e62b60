//! Test fixtures for creating common test objects

use crate::config::{NotifierConfig, SyncConfig, SyncUser};
use crate::engine::WatchRequest;
use crate::store::{Collection, Row, SharedSnapshot, Snapshot, StoreInfo};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Builder for snapshots of a store at `/data<path>.realm`
pub struct SnapshotBuilder {
    store: StoreInfo,
    version: u64,
    collections: BTreeMap<String, Collection>,
}

impl SnapshotBuilder {
    pub fn new(path: &str) -> Self {
        Self {
            store: StoreInfo::new(path, format!("/data{}.realm", path)),
            version: 1,
            collections: BTreeMap::new(),
        }
    }

    pub fn version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Empty collection
    pub fn collection(mut self, name: &str) -> Self {
        self.collections.entry(name.to_string()).or_default();
        self
    }

    /// Append rows whose value is their own key
    pub fn rows(mut self, collection: &str, keys: &[&str]) -> Self {
        let target = self.collections.entry(collection.to_string()).or_default();
        for key in keys {
            target.upsert(Row::new(*key, json!(key)));
        }
        self
    }

    pub fn row(mut self, collection: &str, key: &str, value: Value) -> Self {
        self.collections.entry(collection.to_string()).or_default().upsert(Row::new(key, value));
        self
    }

    pub fn build(self) -> SharedSnapshot {
        Snapshot::new(self.store, self.version, self.collections).into_shared()
    }
}

pub fn test_sync_config() -> SyncConfig {
    SyncConfig::new("realms://sync.example.com/~/notifier", SyncUser::new("admin", "admin-token"))
}

pub fn test_notifier_config() -> NotifierConfig {
    NotifierConfig::new("/srv/notifier", test_sync_config())
}

pub fn test_watch_request() -> WatchRequest {
    WatchRequest { working_directory: "/srv/notifier".into(), sync: test_sync_config() }
}
