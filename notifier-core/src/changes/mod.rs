/*
    changes - Turning committed transitions into per-collection diffs

    - index_set:    sparse position sets, flattened for transport
    - changeset:    deletions / insertions / modifications of one collection
    - notification: one store transition with lazily computed changes
*/

pub mod changeset;
pub mod errors;
pub mod index_set;
pub mod notification;

pub use changeset::ChangeSet;
pub use errors::{ChangeError, ChangeResult};
pub use index_set::IndexSet;
pub use notification::{ChangeNotification, CollectionChanges};
