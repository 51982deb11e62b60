//! Metrics for notifier observability
//!
//! Metrics are emitted through the `metrics` facade; installing a recorder
//! is left to the host. Without one every call is a no-op.

use ::metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Instant;

pub const STORES_ADMITTED: &str = "notifier.stores.admitted";
pub const STORES_REJECTED: &str = "notifier.stores.rejected";
pub const NOTIFICATIONS_ENQUEUED: &str = "notifier.notifications.enqueued";
pub const NOTIFICATIONS_DELIVERED: &str = "notifier.notifications.delivered";
pub const CHANGES_COMPUTED: &str = "notifier.changes.computed";
pub const CHANGES_DURATION_MS: &str = "notifier.changes.duration_ms";
pub const QUEUE_DEPTH: &str = "notifier.queue.depth";

/// Initialize metrics with descriptions
pub fn init_metrics() {
    describe_counter!(STORES_ADMITTED, "Stores the consumer chose to observe");
    describe_counter!(STORES_REJECTED, "Stores the consumer declined to observe");
    describe_counter!(NOTIFICATIONS_ENQUEUED, "Change notifications placed on a ready queue");
    describe_counter!(NOTIFICATIONS_DELIVERED, "Change notifications taken by the consumer");
    describe_counter!(CHANGES_COMPUTED, "Change sets computed from snapshot pairs");
    describe_histogram!(CHANGES_DURATION_MS, "Change set computation duration in milliseconds");
    describe_gauge!(QUEUE_DEPTH, "Notifications waiting on ready queues");
}

/// Record a counter metric
pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

/// Record a gauge metric
pub fn record_gauge(name: &'static str, value: f64) {
    gauge!(name).set(value);
}

/// Record a histogram metric
pub fn record_histogram(name: &'static str, value: f64) {
    histogram!(name).record(value);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self { name, start: Instant::now() }
    }

    /// Stop the timer and record the duration in milliseconds
    pub fn stop(self) {
        record_histogram(self.name, self.start.elapsed().as_secs_f64() * 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_recorder() {
        init_metrics();
        record_counter(STORES_ADMITTED, 1);
        record_gauge(QUEUE_DEPTH, 3.0);
    }

    #[test]
    fn test_timer() {
        let timer = Timer::new(CHANGES_DURATION_MS);
        std::thread::sleep(std::time::Duration::from_millis(1));
        timer.stop();
    }
}
