//! Global atomic counters for Ripple observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. after a batch of events).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations and no locking.
pub struct Metrics {
    events_received: AtomicU64,
    events_done: AtomicU64,
    events_failed: AtomicU64,
    events_superseded: AtomicU64,
    reasoning_attempts: AtomicU64,
    comments_posted: AtomicU64,
    publication_replays: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! counter {
    ($inc:ident, $get:ident, $field:ident) => {
        pub fn $inc(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(metric = stringify!($field), "counter incremented");
        }

        pub fn $get(&self) -> u64 {
            self.$field.load(Ordering::Relaxed)
        }
    };
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            events_received: AtomicU64::new(0),
            events_done: AtomicU64::new(0),
            events_failed: AtomicU64::new(0),
            events_superseded: AtomicU64::new(0),
            reasoning_attempts: AtomicU64::new(0),
            comments_posted: AtomicU64::new(0),
            publication_replays: AtomicU64::new(0),
        }
    }

    counter!(inc_events_received, events_received, events_received);
    counter!(inc_events_done, events_done, events_done);
    counter!(inc_events_failed, events_failed, events_failed);
    counter!(inc_events_superseded, events_superseded, events_superseded);
    counter!(inc_reasoning_attempts, reasoning_attempts, reasoning_attempts);
    counter!(inc_comments_posted, comments_posted, comments_posted);
    counter!(inc_publication_replays, publication_replays, publication_replays);

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            events_received = self.events_received(),
            events_done = self.events_done(),
            events_failed = self.events_failed(),
            events_superseded = self.events_superseded(),
            reasoning_attempts = self.reasoning_attempts(),
            comments_posted = self.comments_posted(),
            publication_replays = self.publication_replays(),
        );
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        for counter in [
            &self.events_received,
            &self.events_done,
            &self.events_failed,
            &self.events_superseded,
            &self.reasoning_attempts,
            &self.comments_posted,
            &self.publication_replays,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
