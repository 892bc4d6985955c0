//! Delivery queue
//!
//! Thread-safe, unbounded FIFO of pending delivery actions. `push` never
//! blocks; the background sender waits on `pop_timeout`; shutdown drains
//! everything at once with `drain`.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::models::DeliveryAction;

/// Unbounded FIFO queue of pending delivery actions
#[derive(Default)]
pub struct DeliveryQueue {
    items: Mutex<VecDeque<DeliveryAction>>,
    available: Condvar,
}

impl DeliveryQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action. Non-blocking; wakes one waiting consumer.
    pub fn push(&self, action: DeliveryAction) {
        self.items.lock().push_back(action);
        self.available.notify_one();
    }

    /// Pop the oldest action, waiting up to `timeout` for one to arrive.
    /// Returns `None` on timeout.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<DeliveryAction> {
        let mut items = self.items.lock();
        if items.is_empty() {
            let _ = self.available.wait_for(&mut items, timeout);
        }
        items.pop_front()
    }

    /// Remove and return every currently queued action without waiting,
    /// in insertion order. The queue is empty afterwards.
    pub fn drain(&self) -> Vec<DeliveryAction> {
        self.items.lock().drain(..).collect()
    }

    /// Number of queued actions
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Wake every waiting consumer without enqueuing. Used by shutdown
    /// so the worker notices the stop flag before its wait times out.
    pub fn notify_all(&self) {
        self.available.notify_all();
    }
}
