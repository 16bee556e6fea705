//! Per-PR serialization with generation tickets.
//!
//! Every event for a PR takes a [`PrTicket`] on arrival. Tickets are numbered
//! in arrival order, and holders run one at a time through the PR's async
//! mutex. A holder whose generation is older than the newest ticket issued
//! for its PR is superseded and should stop at its next stage boundary.
//!
//! A redelivery of a delivery id that already holds a live ticket reuses that
//! ticket's generation, so it never supersedes a newer event.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
struct Entry {
    latest: AtomicU64,
    lock: Arc<AsyncMutex<()>>,
    deliveries: Mutex<HashMap<String, u64>>,
}

/// Issues tickets and tokens per PR key (`repo#pr`).
#[derive(Debug, Default)]
pub struct PrGate {
    entries: Mutex<HashMap<String, Weak<Entry>>>,
}

impl PrGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a generation for `delivery_id` on `key`. Never blocks.
    ///
    /// A delivery id seen before on a live entry keeps its first generation.
    pub fn ticket(&self, key: &str, delivery_id: &str) -> PrTicket {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, weak| weak.strong_count() > 0);
        let entry = match entries.get(key).and_then(Weak::upgrade) {
            Some(existing) => existing,
            None => {
                let fresh = Arc::new(Entry::default());
                entries.insert(key.to_string(), Arc::downgrade(&fresh));
                fresh
            }
        };
        let generation = {
            let mut deliveries = entry.deliveries.lock().unwrap_or_else(|e| e.into_inner());
            *deliveries
                .entry(delivery_id.to_string())
                .or_insert_with(|| entry.latest.fetch_add(1, Ordering::SeqCst) + 1)
        };
        PrTicket { entry, generation }
    }

    /// Newest generation issued for `key`, or 0 if no ticket is alive.
    pub fn latest(&self, key: &str) -> u64 {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .and_then(Weak::upgrade)
            .map(|entry| entry.latest.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// PRs with at least one live ticket.
    pub fn active_prs(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.values().filter(|weak| weak.strong_count() > 0).count()
    }
}

/// An event's place in its PR's queue.
#[derive(Debug)]
pub struct PrTicket {
    entry: Arc<Entry>,
    generation: u64,
}

impl PrTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait (FIFO) until no other ticket for this PR holds the token.
    pub async fn acquire(&self) -> PrToken {
        PrToken {
            _guard: self.entry.lock.clone().lock_owned().await,
        }
    }

    /// True once a newer ticket has been issued for the same PR.
    pub fn is_superseded(&self) -> bool {
        self.entry.latest.load(Ordering::SeqCst) > self.generation
    }
}

/// Exclusive right to process the PR; released on drop.
#[derive(Debug)]
pub struct PrToken {
    _guard: OwnedMutexGuard<()>,
}
