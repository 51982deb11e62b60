//! Test utilities shared by unit and integration tests
//!
//! - fixtures: snapshot builder and ready-made configurations
//! - recording: callback implementations that record every call
//! - async_helpers: waiting on conditions driven by a notifier worker

pub mod async_helpers;
pub mod fixtures;
pub mod recording;

pub use async_helpers::*;
pub use fixtures::*;
pub use recording::*;
