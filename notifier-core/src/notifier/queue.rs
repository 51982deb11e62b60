/*
    queue.rs - Ready-queue of realized change notifications

    FIFO, safe for any number of producers and consumers. The worker is the
    only producer; consumers drain it through `next_changed_realm`, usually
    from inside the `realm_changed` callback. Per-store commit order is
    preserved because the worker pushes in the order the engine reports.

    Closing the queue drops whatever is still pending and makes every later
    push a no-op, so nothing is handed out after a notifier goes away.
*/

use crate::changes::ChangeNotification;
use crate::metrics::{self, QUEUE_DEPTH};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct QueueState {
    items: VecDeque<ChangeNotification>,
    closed: bool,
}

#[derive(Default)]
pub struct ReadyQueue {
    state: Mutex<QueueState>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a notification; returns false (and drops it) once closed
    pub fn push(&self, notification: ChangeNotification) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.items.push_back(notification);
        metrics::record_gauge(QUEUE_DEPTH, state.items.len() as f64);
        true
    }

    pub fn pop(&self) -> Option<ChangeNotification> {
        let mut state = self.lock();
        let item = state.items.pop_front();
        if item.is_some() {
            metrics::record_gauge(QUEUE_DEPTH, state.items.len() as f64);
        }
        item
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Close the queue and return how many notifications were orphaned
    pub fn close(&self) -> usize {
        let mut state = self.lock();
        state.closed = true;
        let orphaned = state.items.len();
        state.items.clear();
        orphaned
    }
}
