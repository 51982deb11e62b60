/*
    global.rs - GlobalNotifier handle and its worker task

    Lifecycle:
    1. `create` validates the configuration and registers a watch with the
       engine. Events start buffering immediately.
    2. `start` spawns the worker on the current tokio runtime.
    3. The worker admits stores, builds notifications and calls
       `realm_changed` whenever the ready-queue has something and the
       initial download is done. Commits seen while downloading are queued
       and handed out right after `download_complete`.
    4. `destroy` stops the worker, drops the watch and orphans anything
       still queued.

    Callers must not destroy a notifier while one of its callbacks is
    running on another thread. A started worker keeps the notifier alive,
    so dropping every handle without `destroy` does not stop it.
*/

use super::admission::{Admission, AdmissionCache};
use super::callback::NotifierCallback;
use super::errors::{NotifierError, NotifierResult};
use super::queue::ReadyQueue;
use super::state::{NotifierState, StateCell};
use crate::changes::ChangeNotification;
use crate::config::NotifierConfig;
use crate::engine::{EngineEvent, EventReceiver, SyncEngine, WatchId, WatchRequest};
use crate::metrics::{self, NOTIFICATIONS_DELIVERED, NOTIFICATIONS_ENQUEUED};
use crate::store::SharedSnapshot;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle to a running multiplexer. Cheap to clone.
#[derive(Clone)]
pub struct GlobalNotifier {
    inner: Arc<Inner>,
}

struct Inner {
    id: Uuid,
    config: NotifierConfig,
    callback: Arc<dyn NotifierCallback>,
    engine: Arc<dyn SyncEngine>,
    watch_id: WatchId,
    state: StateCell,
    queue: ReadyQueue,
    events: Mutex<Option<EventReceiver>>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

impl GlobalNotifier {
    /// Validate `config` and register a watch with `engine`.
    ///
    /// Only configuration and watch registration errors are returned here;
    /// everything that happens later goes through `callback`.
    pub fn create(
        config: NotifierConfig,
        callback: Arc<dyn NotifierCallback>,
        engine: Arc<dyn SyncEngine>,
    ) -> NotifierResult<Self> {
        config.validate()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let request = WatchRequest {
            working_directory: config.working_directory.clone(),
            sync: config.sync.clone(),
        };
        let watch_id = engine.watch(request, events_tx)?;
        let (shutdown, _) = watch::channel(false);

        let id = Uuid::new_v4();
        info!(
            notifier = %id,
            working_directory = %config.working_directory.display(),
            "global notifier created"
        );

        Ok(GlobalNotifier {
            inner: Arc::new(Inner {
                id,
                config,
                callback,
                engine,
                watch_id,
                state: StateCell::new(),
                queue: ReadyQueue::new(),
                events: Mutex::new(Some(events_rx)),
                shutdown,
                worker: Mutex::new(None),
                destroyed: AtomicBool::new(false),
            }),
        })
    }

    /// Spawn the worker on the current tokio runtime
    pub fn start(&self) -> NotifierResult<()> {
        if self.is_destroyed() {
            return Err(NotifierError::Destroyed);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| NotifierError::NoRuntime)?;
        let events = lock(&self.inner.events).take().ok_or(NotifierError::AlreadyStarted)?;
        self.inner.state.transition(NotifierState::Downloading)?;

        let worker = Worker {
            notifier: self.clone(),
            events,
            admission: AdmissionCache::new(),
            shutdown: self.inner.shutdown.subscribe(),
        };
        let span = info_span!("global_notifier", id = %self.inner.id);
        let handle = runtime.spawn(worker.run().instrument(span));
        *lock(&self.inner.worker) = Some(handle);

        info!(notifier = %self.inner.id, "global notifier started");
        Ok(())
    }

    /// Pop the next ready notification, if any
    pub fn next_changed_realm(&self) -> Option<ChangeNotification> {
        if self.is_destroyed() {
            return None;
        }
        let notification = self.inner.queue.pop()?;
        metrics::record_counter(NOTIFICATIONS_DELIVERED, 1);
        trace!(path = notification.realm_path(), "notification dequeued");
        Some(notification)
    }

    /// Stop listening and release the watch.
    ///
    /// Pending notifications are dropped. Returns false if the notifier
    /// was already destroyed.
    pub fn destroy(&self) -> bool {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            warn!(notifier = %self.inner.id, "notifier destroyed twice");
            return false;
        }

        self.inner.shutdown.send_replace(true);
        let orphaned = self.inner.queue.close();
        self.inner.engine.unwatch(self.inner.watch_id);
        lock(&self.inner.events).take();

        info!(notifier = %self.inner.id, orphaned, "global notifier destroyed");
        true
    }

    /// Wait for the worker task to exit
    pub async fn stopped(&self) {
        let handle = lock(&self.inner.worker).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(notifier = %self.inner.id, error = %e, "notifier worker ended abnormally");
            }
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.inner.config
    }

    pub fn state(&self) -> NotifierState {
        self.inner.state.get()
    }

    /// Notifications waiting in the ready-queue
    pub fn pending(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for GlobalNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalNotifier")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if !*self.destroyed.get_mut() {
            self.engine.unwatch(self.watch_id);
        }
    }
}

/// Change detection loop, one per started notifier
struct Worker {
    notifier: GlobalNotifier,
    events: EventReceiver,
    admission: AdmissionCache,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    async fn run(mut self) {
        let timeout = self.notifier.inner.config.download_timeout;
        let download_deadline = async move {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(download_deadline);

        debug!("worker started");
        loop {
            let downloading = self.notifier.state() == NotifierState::Downloading;

            let flow = tokio::select! {
                biased;

                _ = self.shutdown.changed() => ControlFlow::Break(()),

                _ = &mut download_deadline, if downloading => {
                    self.fail(NotifierError::DownloadTimeout(timeout.unwrap_or_default()))
                }

                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        debug!("engine closed the watch");
                        ControlFlow::Break(())
                    }
                },
            };

            if flow.is_break() {
                break;
            }
        }
        debug!("worker stopped");
    }

    fn handle_event(&mut self, event: EngineEvent) -> ControlFlow<()> {
        match event {
            EngineEvent::DownloadComplete => self.download_complete(),
            EngineEvent::Committed(snapshot) => self.committed(snapshot),
            EngineEvent::StoreRemoved(path) => {
                if self.admission.forget(&path) {
                    debug!(path, "store removed");
                }
                ControlFlow::Continue(())
            }
            EngineEvent::Error(e) => self.fail(e.into()),
        }
    }

    fn download_complete(&mut self) -> ControlFlow<()> {
        let inner = &self.notifier.inner;
        match inner.state.transition(NotifierState::Ready) {
            Ok(_) => {
                info!(
                    stores = self.admission.len(),
                    pending = inner.queue.len(),
                    "initial download complete"
                );
                inner.callback.download_complete();
                self.deliver();
            }
            Err(e) => warn!(error = %e, "ignoring download completion"),
        }
        ControlFlow::Continue(())
    }

    fn committed(&mut self, snapshot: SharedSnapshot) -> ControlFlow<()> {
        let callback = &self.notifier.inner.callback;
        let admission = self
            .admission
            .observe(&snapshot, |s| callback.realm_available(s.path_on_disk(), s.path()));

        let previous = match admission {
            Admission::Rejected => {
                trace!(path = snapshot.path(), "commit on unobserved store");
                return ControlFlow::Continue(());
            }
            Admission::Admitted { previous } => previous,
        };

        let notification = match ChangeNotification::new(previous, snapshot) {
            Ok(notification) => notification,
            Err(e) => return self.fail(e.into()),
        };

        trace!(
            path = notification.realm_path(),
            version = notification.get_new_snapshot().version(),
            "notification queued"
        );
        if self.notifier.inner.queue.push(notification) {
            metrics::record_counter(NOTIFICATIONS_ENQUEUED, 1);
        }

        if self.notifier.state() == NotifierState::Ready {
            self.deliver();
        }
        ControlFlow::Continue(())
    }

    /// Let the consumer drain the ready-queue
    fn deliver(&self) {
        let inner = &self.notifier.inner;
        if inner.queue.is_empty() || inner.state.transition(NotifierState::Delivering).is_err() {
            return;
        }

        inner.callback.realm_changed(&self.notifier);

        // An error raised during the callback already moved us to Errored
        if let Err(e) = inner.state.transition(NotifierState::Ready) {
            debug!(error = %e, "delivery ended outside of Delivering");
        }
    }

    fn fail(&self, error: NotifierError) -> ControlFlow<()> {
        let inner = &self.notifier.inner;
        let from = match inner.state.transition(NotifierState::Errored) {
            Ok(from) => from,
            Err(e) => {
                warn!(error = %e, "dropping error reported in terminal state");
                return ControlFlow::Break(());
            }
        };

        let orphaned = inner.queue.close();
        if from.is_synced() {
            error!(error = %error, orphaned, "notifier failed after initial download");
        } else {
            warn!(error = %error, "notifier failed before initial download");
        }

        inner.callback.error(error);
        ControlFlow::Break(())
    }
}
