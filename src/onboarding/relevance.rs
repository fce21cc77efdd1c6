//! Staleness guard for resolver calls.
//!
//! A `RelevanceToken` is issued before an awaited lookup and checked after
//! it resolves. Issuing a newer token, or invalidating the tracker, makes
//! every older token stale, so only the latest request may apply its result.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Default)]
pub struct RelevanceTracker {
    generation: Arc<AtomicU64>,
}

/// Proof that a request was the latest one when it was issued.
#[derive(Debug, Clone)]
pub struct RelevanceToken {
    generation: u64,
    tracker: Arc<AtomicU64>,
}

impl RelevanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token for a new request, superseding all earlier ones.
    pub fn issue(&self) -> RelevanceToken {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        RelevanceToken {
            generation,
            tracker: Arc::clone(&self.generation),
        }
    }

    /// Mark every outstanding token stale without starting a new request.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl RelevanceToken {
    pub fn is_current(&self) -> bool {
        self.tracker.load(Ordering::SeqCst) == self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
