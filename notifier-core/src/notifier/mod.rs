/*
    notifier - Global change-notification multiplexer

    Watches every store under a working directory through a SyncEngine,
    filters them through the consumer's admission predicate and turns each
    committed transaction of an admitted store into a ChangeNotification.

    Architecture:

    ┌──────────────────────────────────────────────┐
    │                 SyncEngine                   │
    └──────────────────────┬───────────────────────┘
                           │ EngineEvent (unbounded mpsc)
    ┌──────────────────────▼───────────────────────┐
    │  Worker task (one per notifier)              │
    │   • AdmissionCache: predicate once per store │
    │   • ChangeNotification::new(previous, new)   │
    │   • StateCell: Created → Downloading → Ready │
    └──────────────────────┬───────────────────────┘
                           │ push
    ┌──────────────────────▼───────────────────────┐
    │  ReadyQueue (FIFO)                           │
    └──────────────────────┬───────────────────────┘
                           │ realm_changed → next_changed_realm
    ┌──────────────────────▼───────────────────────┐
    │  NotifierCallback (consumer side)            │
    └──────────────────────────────────────────────┘
*/

pub mod admission;
pub mod callback;
pub mod errors;
pub mod global;
pub mod queue;
pub mod state;

pub use admission::{Admission, AdmissionCache};
pub use callback::NotifierCallback;
pub use errors::{NotifierError, NotifierResult, ETIMEDOUT};
pub use global::GlobalNotifier;
pub use queue::ReadyQueue;
pub use state::{NotifierState, StateCell};
