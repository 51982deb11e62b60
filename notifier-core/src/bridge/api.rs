/*
    api.rs - Handle-based entry points for the consumer

    Every object the consumer sees is a typed integer handle:

    | handle             | created by                            | destroyed by          |
    |--------------------|---------------------------------------|-----------------------|
    | NotifierHandle     | create_notifier(_from_raw)            | destroy_notifier      |
    | NotificationHandle | enqueue_calculation callback          | destroy_notification  |
    | SnapshotHandle     | notification_get_changes,             | destroy_snapshot      |
    |                    | get_snapshot_for_writing              |                       |

    Each handle is destroyed exactly once; a second destroy returns
    BridgeError::Handle. Dropping the Bridge destroys every notifier it
    still owns.
*/

use super::callbacks::{guard, ConsumerToken, ManagedCallback, NotifierCallbacks, PendingNotification};
use super::errors::BridgeResult;
use super::marshal::{self, ChangeBuffers, FlattenedNotification};
use crate::config::{NotifierConfig, StopPolicy, SyncConfig, SyncUser};
use crate::engine::SyncEngine;
use crate::handles::{Handle, HandleTable};
use crate::notifier::GlobalNotifier;
use crate::store::Snapshot;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, trace};

pub type NotifierHandle = Handle<GlobalNotifier>;
pub type SnapshotHandle = Handle<Snapshot>;
pub type NotificationHandle = Handle<PendingNotification>;

/// Notifier settings as raw buffers from the consumer
#[derive(Debug, Clone, Copy, Default)]
pub struct RawNotifierConfig<'a> {
    pub server_url: &'a [u8],
    pub working_directory: &'a [u8],
    pub identity: &'a [u8],
    pub refresh_token: &'a [u8],
    /// Empty for none
    pub trusted_ca_path: &'a [u8],
    pub client_validate_ssl: bool,
    /// Raw key bytes
    pub encryption_key: Option<&'a [u8]>,
}

impl RawNotifierConfig<'_> {
    /// Decode into a configuration, without validating it
    pub fn decode(&self) -> BridgeResult<NotifierConfig> {
        let server_url = marshal::utf8("server_url", self.server_url)?;
        let working_directory = marshal::utf8("working_directory", self.working_directory)?;
        let identity = marshal::utf8("identity", self.identity)?;
        let refresh_token = marshal::utf8("refresh_token", self.refresh_token)?;
        let trusted_ca_path = marshal::utf8("trusted_ca_path", self.trusted_ca_path)?;

        let mut sync = SyncConfig::new(server_url, SyncUser::new(identity, refresh_token));
        sync.client_validate_ssl = self.client_validate_ssl;
        sync.trusted_ca_path = (!trusted_ca_path.is_empty()).then(|| PathBuf::from(trusted_ca_path));
        sync.stop_policy = StopPolicy::Immediately;
        sync.encryption_key = self.encryption_key.map(hex::encode);

        Ok(NotifierConfig::new(working_directory, sync))
    }
}

/// Owner of every handle handed to consumers of one engine
pub struct Bridge {
    engine: Arc<dyn SyncEngine>,
    notifiers: HandleTable<GlobalNotifier>,
    snapshots: HandleTable<Snapshot>,
    notifications: Arc<HandleTable<PendingNotification>>,
}

impl Bridge {
    pub fn new(engine: Arc<dyn SyncEngine>) -> Self {
        Bridge {
            engine,
            notifiers: HandleTable::new("notifier"),
            snapshots: HandleTable::new("snapshot"),
            notifications: Arc::new(HandleTable::new("notification")),
        }
    }

    /// Create and start a notifier reporting to `callbacks`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn create_notifier(
        &self,
        config: NotifierConfig,
        callbacks: Arc<dyn NotifierCallbacks>,
    ) -> BridgeResult<NotifierHandle> {
        trace!(working_directory = %config.working_directory.display(), "create_notifier()");

        let callback = Arc::new(ManagedCallback::new(callbacks, self.notifications.clone()));
        let notifier = GlobalNotifier::create(config, callback, self.engine.clone())?;

        if let Err(e) = notifier.start() {
            notifier.destroy();
            return Err(e.into());
        }

        let handle = self.notifiers.insert(notifier);
        debug!(handle = ?handle, "notifier created");
        Ok(handle)
    }

    /// `create_notifier` from raw consumer buffers
    pub fn create_notifier_from_raw(
        &self,
        raw: RawNotifierConfig<'_>,
        callbacks: Arc<dyn NotifierCallbacks>,
    ) -> BridgeResult<NotifierHandle> {
        self.create_notifier(raw.decode()?, callbacks)
    }

    pub fn notifier(&self, handle: NotifierHandle) -> BridgeResult<Arc<GlobalNotifier>> {
        Ok(self.notifiers.get(handle)?)
    }

    pub fn destroy_notifier(&self, handle: NotifierHandle) -> BridgeResult<()> {
        trace!(handle = ?handle, "destroy_notifier()");
        let notifier = self.notifiers.remove(handle)?;
        notifier.destroy();
        Ok(())
    }

    /// Open the latest state of the snapshot's store for writing
    pub fn get_snapshot_for_writing(&self, snapshot: SnapshotHandle) -> BridgeResult<SnapshotHandle> {
        trace!(handle = ?snapshot, "get_snapshot_for_writing()");
        let current = self.snapshots.get(snapshot)?;
        let writable = self.engine.open_for_writing(current.store())?;
        Ok(self.snapshots.insert_shared(writable))
    }

    pub fn destroy_snapshot(&self, snapshot: SnapshotHandle) -> BridgeResult<()> {
        trace!(handle = ?snapshot, "destroy_snapshot()");
        self.snapshots.remove(snapshot)?;
        Ok(())
    }

    /// Snapshot behind a handle
    pub fn snapshot(&self, snapshot: SnapshotHandle) -> BridgeResult<Arc<Snapshot>> {
        Ok(self.snapshots.get(snapshot)?)
    }

    /// Compute the changes of a notification and deliver them through
    /// `on_calculation_complete`.
    ///
    /// The envelope carries freshly allocated snapshot handles owned by the
    /// consumer. If the callback panics they are released again and
    /// `CallbackPanicked` is returned.
    pub fn notification_get_changes(
        &self,
        notification: NotificationHandle,
        token: ConsumerToken,
    ) -> BridgeResult<()> {
        trace!(handle = ?notification, token = token.0, "notification_get_changes()");
        let pending = self.notifications.get(notification)?;
        let change = &pending.change;

        let buffers = ChangeBuffers::new(change.get_changes());
        let changesets = buffers.changesets();

        let current_snapshot = change.get_new_snapshot();
        let previous = change.get_old_snapshot().map(|s| self.snapshots.insert_shared(s.clone()));
        let current = self.snapshots.insert_shared(current_snapshot.clone());

        let flattened = FlattenedNotification {
            path: change.realm_path(),
            path_on_disk: current_snapshot.path_on_disk(),
            previous,
            current,
            changesets: &changesets,
        };

        let delivered = guard("on_calculation_complete", || {
            pending.callbacks.on_calculation_complete(&flattened, token)
        });

        if let Err(e) = delivered {
            let _ = self.snapshots.remove(current);
            if let Some(previous) = previous {
                let _ = self.snapshots.remove(previous);
            }
            return Err(e);
        }
        Ok(())
    }

    pub fn destroy_notification(&self, notification: NotificationHandle) -> BridgeResult<()> {
        trace!(handle = ?notification, "destroy_notification()");
        self.notifications.remove(notification)?;
        Ok(())
    }

    pub fn notifier_count(&self) -> usize {
        self.notifiers.len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn notification_count(&self) -> usize {
        self.notifications.len()
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        let notifiers = self.notifiers.drain();
        if notifiers.is_empty() {
            return;
        }

        debug!(count = notifiers.len(), "destroying notifiers owned by dropped bridge");
        for notifier in notifiers {
            notifier.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeError;
    use crate::config::ConfigError;
    use crate::engine::MemoryEngine;
    use crate::test_utils::RecordingCallbacks;

    fn raw<'a>() -> RawNotifierConfig<'a> {
        RawNotifierConfig {
            server_url: b"realms://sync.example.com/",
            working_directory: b"/srv/notifier",
            identity: b"admin",
            refresh_token: b"token",
            trusted_ca_path: b"",
            client_validate_ssl: true,
            encryption_key: None,
        }
    }

    #[test]
    fn test_decode_raw_config() {
        let key = [3u8; 64];
        let config = RawNotifierConfig { trusted_ca_path: b"/etc/ca.pem", encryption_key: Some(&key), ..raw() }
            .decode()
            .unwrap();

        assert_eq!(config.working_directory, PathBuf::from("/srv/notifier"));
        assert_eq!(config.sync.trusted_ca_path, Some(PathBuf::from("/etc/ca.pem")));
        assert_eq!(config.sync.encryption_key_bytes().unwrap(), Some(key.to_vec()));
        assert!(config.validate().is_ok());

        assert_eq!(raw().decode().unwrap().sync.trusted_ca_path, None);
    }

    #[test]
    fn test_malformed_utf8() {
        let err = RawNotifierConfig { identity: &[0xc3, 0x28], ..raw() }.decode().unwrap_err();
        assert!(matches!(err, BridgeError::Marshalling { field: "identity", .. }));
        assert_eq!(err.code(), 2);
    }

    #[tokio::test]
    async fn test_bad_config_is_returned_synchronously() {
        let engine = Arc::new(MemoryEngine::new("/data"));
        let bridge = Bridge::new(engine.clone());
        let callbacks = Arc::new(RecordingCallbacks::new());

        let err = bridge
            .create_notifier_from_raw(RawNotifierConfig { server_url: b"::bad::", ..raw() }, callbacks.clone())
            .unwrap_err();

        assert!(matches!(err, BridgeError::Config(ConfigError::InvalidUrl(_))));
        assert!(callbacks.starts().is_empty());
        assert_eq!(bridge.notifier_count(), 0);
        assert_eq!(engine.watcher_count(), 0);
    }

    #[test]
    fn test_create_without_runtime_cleans_up() {
        let engine = Arc::new(MemoryEngine::new("/data"));
        let bridge = Bridge::new(engine.clone());

        let err = bridge
            .create_notifier_from_raw(raw(), Arc::new(RecordingCallbacks::new()))
            .unwrap_err();
        assert_eq!(err.code(), 5);
        assert_eq!(bridge.notifier_count(), 0);
        assert_eq!(engine.watcher_count(), 0);
    }

    #[test]
    fn test_stale_handles() {
        let bridge = Bridge::new(Arc::new(MemoryEngine::new("/data")));

        assert!(matches!(bridge.destroy_snapshot(Handle::from_raw(0)), Err(BridgeError::Handle(_))));
        assert!(matches!(bridge.destroy_notifier(Handle::from_raw(9)), Err(BridgeError::Handle(_))));
        assert!(matches!(
            bridge.notification_get_changes(Handle::from_raw(1), ConsumerToken(0)),
            Err(BridgeError::Handle(_))
        ));
    }
}
