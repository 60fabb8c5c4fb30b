//! Signal Implementation
//!
//! A Signal holds a value and tells interested parties when it changes.
//! Two kinds of listeners exist:
//!
//! - explicit subscribers registered with `subscribe`, called on every `set`
//! - tracked computations (see `ComputedList`) that read the signal inside a
//!   `TrackingScope` and are re-run through the `Runtime`
//!
//! Binding contexts use a `Signal<usize>` as the `$index` cell of every list
//! item, and a `Signal<Vec<Value>>` can be bound directly as a collection.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::TrackingScope;
use super::runtime::Runtime;
use super::SubscriberId;

static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

type Notifier<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A reactive cell holding a value of type `T`.
///
/// Clones share the same cell.
///
/// # Example
///
/// ```rust,ignore
/// let index = Signal::new(0usize);
/// index.subscribe(SubscriberId::new(), |i| println!("moved to {i}"));
/// index.set(3); // prints "moved to 3"
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    id: u64,
    value: Arc<RwLock<T>>,
    notifiers: Arc<RwLock<Vec<(SubscriberId, Notifier<T>)>>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            id: next_signal_id(),
            value: Arc::new(RwLock::new(value)),
            notifiers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the current value.
    ///
    /// Inside a tracking scope the read is recorded as a dependency of the
    /// running computation.
    pub fn get(&self) -> T {
        if let Some(subscriber_id) = TrackingScope::current_subscriber() {
            TrackingScope::track_dependency(self.id);
            Runtime::add_dependency(self.id, subscriber_id);
        }
        self.value.read().clone()
    }

    /// Get the current value without recording a dependency.
    pub fn get_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// Set a new value and notify subscribers and dependent computations.
    pub fn set(&self, value: T) {
        *self.value.write() = value.clone();
        self.notify_subscribers(&value);
        Runtime::notify_signal_change(self.id);
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.value.read());
        self.set(next);
    }

    /// Register a callback invoked with the new value after every `set`.
    pub fn subscribe<F>(&self, subscriber_id: SubscriberId, notify: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.notifiers.write().push((subscriber_id, Arc::new(notify)));
    }

    /// Remove a subscriber's callbacks.
    pub fn unsubscribe(&self, subscriber_id: SubscriberId) {
        self.notifiers.write().retain(|(id, _)| *id != subscriber_id);
    }

    /// Number of explicit subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.notifiers.read().len()
    }

    fn notify_subscribers(&self, value: &T) {
        // Snapshot first so a callback may (un)subscribe without deadlocking.
        let notifiers: Vec<Notifier<T>> = self
            .notifiers
            .read()
            .iter()
            .map(|(_, notify)| Arc::clone(notify))
            .collect();
        for notify in notifiers {
            notify(value);
        }
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
            notifiers: Arc::clone(&self.notifiers),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
