// Feedback guard: suspends change notifications while the engine writes.
//
// Every self-triggered write sequence holds a `FeedbackGuard`. The first guard
// unsubscribes all topics; dropping the last one resubscribes them, on the error
// path too. Guards nest, so a backup inside a sync pass keeps the pass's window.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::events::{NotificationBus, Topic};

pub struct FeedbackGate {
    bus: Arc<dyn NotificationBus>,
    depth: AtomicUsize,
}

impl FeedbackGate {
    pub fn new(bus: Arc<dyn NotificationBus>) -> Self {
        Self { bus, depth: AtomicUsize::new(0) }
    }

    /// Suspend notifications until the returned guard (and any outer guard) is dropped.
    pub fn suspend(&self) -> FeedbackGuard<'_> {
        if self.depth.fetch_add(1, Ordering::SeqCst) == 0 {
            trace!("suspending change notifications");
            for topic in Topic::ALL {
                self.bus.unsubscribe(topic);
            }
        }
        FeedbackGuard { gate: self }
    }

    /// Number of guards currently held.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

#[must_use = "notifications resume as soon as the guard is dropped"]
pub struct FeedbackGuard<'a> {
    gate: &'a FeedbackGate,
}

impl Drop for FeedbackGuard<'_> {
    fn drop(&mut self) {
        if self.gate.depth.fetch_sub(1, Ordering::SeqCst) == 1 {
            trace!("resuming change notifications");
            for topic in Topic::ALL {
                self.gate.bus.subscribe(topic);
            }
        }
    }
}
