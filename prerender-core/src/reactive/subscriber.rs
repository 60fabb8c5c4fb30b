//! Subscriber identities for the reactive system.
//!
//! Everything that listens to a reactive value (a computed list, a live
//! text binding, a list binding watching its collection) is keyed by a
//! `SubscriberId` so it can later be removed again.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}
