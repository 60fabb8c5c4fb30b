//! Computed List
//!
//! A list produced by a closure over other signals. The closure runs inside
//! a `TrackingScope`, so every signal it reads becomes a dependency; when
//! one of them changes, the runtime re-runs it and the list publishes the
//! diff against its previous contents.
//!
//! This is how a binding follows a collection it has no direct handle to,
//! for instance `if toggle { list_a } else { list_b }`.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use super::array::ChangeListener;
use super::context::TrackingScope;
use super::diff::{compare_arrays, ArrayChange};
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::SubscriberId;

type Compute = Box<dyn Fn() -> Vec<Value> + Send + Sync>;

struct ComputedInner {
    subscriber_id: SubscriberId,
    compute: Compute,
    contents: Mutex<Vec<Value>>,
    listeners: RwLock<Vec<(SubscriberId, ChangeListener)>>,
    evaluations: Mutex<usize>,
}

impl ComputedInner {
    fn evaluate(&self) -> Vec<Value> {
        Runtime::clear_dependencies(self.subscriber_id);
        let _scope = TrackingScope::enter(self.subscriber_id);
        let next = (self.compute)();
        *self.evaluations.lock() += 1;
        next
    }

    fn reevaluate(&self) {
        let next = self.evaluate();
        let changes = {
            let mut contents = self.contents.lock();
            let changes = compare_arrays(&contents, &next);
            *contents = next;
            changes
        };

        if changes.is_empty() {
            return;
        }
        let listeners: Vec<ChangeListener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&changes);
        }
    }
}

impl Reactive for ComputedInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_maybe_dirty(&self) {}

    fn schedule(&self) {
        self.reevaluate();
    }

    fn is_eager(&self) -> bool {
        true
    }
}

/// A tracked, self-updating list.
///
/// Clones share the same computation. The computation stays registered for
/// as long as any clone is alive.
#[derive(Clone)]
pub struct ComputedList {
    inner: Arc<ComputedInner>,
    _handle: Arc<ReactiveHandle>,
}

impl ComputedList {
    /// Create the list and evaluate it once to collect its dependencies.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> Vec<Value> + Send + Sync + 'static,
    {
        let inner = Arc::new(ComputedInner {
            subscriber_id: SubscriberId::new(),
            compute: Box::new(compute),
            contents: Mutex::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
            evaluations: Mutex::new(0),
        });

        let initial = inner.evaluate();
        *inner.contents.lock() = initial;

        let reactive: Arc<dyn Reactive> = inner.clone();
        let handle = Runtime::register(reactive);

        Self {
            inner,
            _handle: Arc::new(handle),
        }
    }

    /// The contents as of the last evaluation.
    pub fn snapshot(&self) -> Vec<Value> {
        self.inner.contents.lock().clone()
    }

    /// How many times the closure has run.
    pub fn evaluation_count(&self) -> usize {
        *self.inner.evaluations.lock()
    }

    pub fn subscribe_changes<F>(&self, subscriber_id: SubscriberId, listener: F)
    where
        F: Fn(&[ArrayChange]) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .write()
            .push((subscriber_id, Arc::new(listener)));
    }

    pub fn unsubscribe(&self, subscriber_id: SubscriberId) {
        self.inner
            .listeners
            .write()
            .retain(|(id, _)| *id != subscriber_id);
    }
}

impl std::fmt::Debug for ComputedList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputedList")
            .field("contents", &self.snapshot())
            .field("evaluations", &self.evaluation_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use serde_json::json;
    use std::sync::Weak;

    fn downgrade(list: &ComputedList) -> Weak<dyn Reactive> {
        let reactive: Arc<dyn Reactive> = list.inner.clone();
        Arc::downgrade(&reactive)
    }

    #[test]
    fn evaluates_once_on_creation() {
        let list = ComputedList::new(|| vec![json!(1), json!(2)]);
        assert_eq!(list.evaluation_count(), 1);
        assert_eq!(list.snapshot(), vec![json!(1), json!(2)]);
    }

    #[test]
    fn follows_the_signal_it_reads() {
        let toggle = Signal::new(true);
        let reader = toggle.clone();
        let list = ComputedList::new(move || {
            if reader.get() {
                vec![json!(1), json!(2), json!(3)]
            } else {
                vec![json!(1), json!(2), json!(3), json!(4)]
            }
        });

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        list.subscribe_changes(SubscriberId::new(), move |changes| {
            sink.lock().extend_from_slice(changes);
        });

        toggle.set(false);

        assert_eq!(list.snapshot().len(), 4);
        assert_eq!(*seen.lock(), vec![ArrayChange::added(3, json!(4))]);
    }

    #[test]
    fn unchanged_result_publishes_nothing() {
        let trigger = Signal::new(0);
        let reader = trigger.clone();
        let list = ComputedList::new(move || {
            reader.get();
            vec![json!("same")]
        });

        let calls = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&calls);
        list.subscribe_changes(SubscriberId::new(), move |_| *sink.lock() += 1);

        trigger.set(1);

        assert_eq!(list.evaluation_count(), 2);
        assert_eq!(*calls.lock(), 0);
    }

    #[test]
    fn dropping_the_list_stops_evaluation() {
        let trigger = Signal::new(0);
        let reader = trigger.clone();
        let list = ComputedList::new(move || vec![json!(reader.get())]);
        let weak = downgrade(&list);

        drop(list);
        trigger.set(1);

        assert!(weak.upgrade().is_none());
    }
}
