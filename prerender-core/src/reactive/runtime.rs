//! Reactive Runtime
//!
//! The runtime connects signals to the computations that read them.
//!
//! # How It Works
//!
//! 1. A computation registers itself and receives a `ReactiveHandle`.
//! 2. While it runs inside a `TrackingScope`, every signal it reads calls
//!    `Runtime::add_dependency`.
//! 3. When a signal is written, `Runtime::notify_signal_change` marks every
//!    dependent and re-schedules the eager ones.
//!
//! The registry is global and holds weak references, so dropping a
//! computation is enough to stop it from being notified.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;

use super::context::TrackingScope;
use super::subscriber::SubscriberId;

/// A computation that can be notified when one of its signals changes.
pub trait Reactive: Send + Sync {
    /// The subscriber ID this computation tracks under.
    fn subscriber_id(&self) -> SubscriberId;

    /// Mark the computation as possibly stale.
    fn mark_maybe_dirty(&self);

    /// Re-run the computation.
    fn schedule(&self);

    /// Eager computations are re-run on change; lazy ones only marked.
    fn is_eager(&self) -> bool;
}

/// Handle to a registered computation.
///
/// Dropping this handle unregisters the computation from the runtime.
#[derive(Debug)]
pub struct ReactiveHandle {
    subscriber_id: SubscriberId,
}

impl ReactiveHandle {
    /// The subscriber this handle keeps registered.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.subscriber_id);
    }
}

/// The global reactive runtime.
pub struct Runtime;

type Registry = RwLock<HashMap<SubscriberId, Weak<dyn Reactive>>>;
type SignalSubscribers = RwLock<HashMap<u64, Vec<SubscriberId>>>;

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static SIGNAL_SUBSCRIBERS: OnceLock<SignalSubscribers> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

fn signal_subscribers() -> &'static SignalSubscribers {
    SIGNAL_SUBSCRIBERS.get_or_init(|| RwLock::new(HashMap::new()))
}

impl Runtime {
    /// Register a computation with the runtime.
    pub fn register(reactive: Arc<dyn Reactive>) -> ReactiveHandle {
        let id = reactive.subscriber_id();
        registry().write().insert(id, Arc::downgrade(&reactive));
        ReactiveHandle { subscriber_id: id }
    }

    fn unregister(id: SubscriberId) {
        registry().write().remove(&id);
        Self::clear_dependencies(id);
    }

    /// Record that a subscriber depends on a signal.
    pub fn add_dependency(signal_id: u64, subscriber_id: SubscriberId) {
        let mut subscribers = signal_subscribers().write();
        let entry = subscribers.entry(signal_id).or_default();
        if !entry.contains(&subscriber_id) {
            entry.push(subscriber_id);
        }
    }

    /// Remove every dependency recorded for a subscriber.
    ///
    /// Called before a computation re-runs so stale reads are forgotten.
    pub fn clear_dependencies(subscriber_id: SubscriberId) {
        let mut subscribers = signal_subscribers().write();
        for subs in subscribers.values_mut() {
            subs.retain(|s| *s != subscriber_id);
        }
        subscribers.retain(|_, subs| !subs.is_empty());
    }

    /// Number of subscribers currently depending on a signal.
    pub fn dependent_count(signal_id: u64) -> usize {
        signal_subscribers()
            .read()
            .get(&signal_id)
            .map_or(0, Vec::len)
    }

    /// Notify every dependent that a signal changed.
    pub fn notify_signal_change(signal_id: u64) {
        let subscriber_ids = signal_subscribers()
            .read()
            .get(&signal_id)
            .cloned()
            .unwrap_or_default();

        if subscriber_ids.is_empty() {
            return;
        }

        let eager: Vec<Arc<dyn Reactive>> = {
            let registry = registry().read();
            subscriber_ids
                .iter()
                .filter_map(|id| registry.get(id).and_then(Weak::upgrade))
                .inspect(|reactive| reactive.mark_maybe_dirty())
                .filter(|reactive| reactive.is_eager())
                .collect()
        };

        // Locks are released before re-running anything; computations read
        // signals and register new dependencies while they run.
        for reactive in eager {
            reactive.schedule();
        }
    }

    /// The subscriber currently being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        TrackingScope::current_subscriber()
    }

    /// Check if we're inside a tracking scope.
    pub fn is_tracking() -> bool {
        TrackingScope::is_active()
    }
}
