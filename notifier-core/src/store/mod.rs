/*
    Store subsystem - snapshot model shared by the engine and the notifier
*/

pub mod snapshot;
pub mod transaction;

pub use snapshot::{Collection, Row, RowDigest, SharedSnapshot, Snapshot, StoreInfo};
pub use transaction::Transaction;
