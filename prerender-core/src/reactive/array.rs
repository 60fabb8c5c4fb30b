//! Observable Array
//!
//! A shared, mutable list of JSON values that reports every mutation as a
//! structured diff. This is what a list binding subscribes to.
//!
//! Positional edits (`push`, `shift`, `splice` and friends) know what they
//! changed and build their change set directly. Only `replace` and `update`
//! fall back to `compare_arrays`.
//!
//! Listeners run after the write lock is released, so a listener may read
//! the array (or even mutate it again) without deadlocking.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use super::diff::{compare_arrays, ArrayChange};
use super::SubscriberId;

/// Callback receiving the diff produced by one mutation.
pub type ChangeListener = Arc<dyn Fn(&[ArrayChange]) + Send + Sync>;

/// A list that publishes its changes.
///
/// Clones share the same list and listeners.
#[derive(Clone, Default)]
pub struct ObservableArray {
    items: Arc<RwLock<Vec<Value>>>,
    listeners: Arc<RwLock<Vec<(SubscriberId, ChangeListener)>>>,
}

impl ObservableArray {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: Arc::new(RwLock::new(items)),
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// A copy of the current contents.
    pub fn snapshot(&self) -> Vec<Value> {
        self.items.read().clone()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.read().get(index).cloned()
    }

    pub fn push(&self, value: Value) {
        self.apply(|items| {
            let change = ArrayChange::added(items.len(), value.clone());
            items.push(value);
            ((), vec![change])
        });
    }

    pub fn pop(&self) -> Option<Value> {
        self.apply(|items| match items.pop() {
            Some(value) => {
                let change = ArrayChange::deleted(items.len(), value.clone());
                (Some(value), vec![change])
            }
            None => (None, Vec::new()),
        })
    }

    /// Remove and return the first item.
    pub fn shift(&self) -> Option<Value> {
        self.remove(0)
    }

    /// Insert an item at the front.
    pub fn unshift(&self, value: Value) {
        self.insert(0, value);
    }

    /// Insert an item at `index`, clamped to the current length.
    pub fn insert(&self, index: usize, value: Value) {
        self.apply(|items| {
            let index = index.min(items.len());
            let change = ArrayChange::added(index, value.clone());
            items.insert(index, value);
            ((), vec![change])
        });
    }

    pub fn remove(&self, index: usize) -> Option<Value> {
        self.apply(|items| {
            if index >= items.len() {
                return (None, Vec::new());
            }
            let value = items.remove(index);
            let change = ArrayChange::deleted(index, value.clone());
            (Some(value), vec![change])
        })
    }

    /// Remove `delete_count` items starting at `start` and insert `insert`
    /// in their place. Returns the removed items.
    ///
    /// Removed items are reported at their old positions and inserted ones
    /// at their new positions, without looking for equal values.
    pub fn splice<I>(&self, start: usize, delete_count: usize, insert: I) -> Vec<Value>
    where
        I: IntoIterator<Item = Value>,
    {
        self.apply(|items| {
            let start = start.min(items.len());
            let end = start.saturating_add(delete_count).min(items.len());
            let inserted: Vec<Value> = insert.into_iter().collect();

            let mut changes = Vec::with_capacity(end - start + inserted.len());
            changes.extend(
                items[start..end]
                    .iter()
                    .enumerate()
                    .map(|(offset, value)| ArrayChange::deleted(start + offset, value.clone())),
            );
            changes.extend(
                inserted
                    .iter()
                    .enumerate()
                    .map(|(offset, value)| ArrayChange::added(start + offset, value.clone())),
            );

            let removed = items.splice(start..end, inserted).collect();
            (removed, changes)
        })
    }

    /// Replace the whole contents.
    pub fn replace(&self, items: Vec<Value>) {
        self.apply(|current| {
            let changes = compare_arrays(current, &items);
            *current = items;
            ((), changes)
        });
    }

    /// Apply an arbitrary in-place edit, publishing a single diff.
    pub fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Vec<Value>) -> R,
    {
        self.apply(|items| {
            let before = items.clone();
            let result = f(items);
            let changes = compare_arrays(&before, items);
            (result, changes)
        })
    }

    /// Register a listener for change sets.
    pub fn subscribe_changes<F>(&self, subscriber_id: SubscriberId, listener: F)
    where
        F: Fn(&[ArrayChange]) + Send + Sync + 'static,
    {
        self.listeners.write().push((subscriber_id, Arc::new(listener)));
    }

    pub fn unsubscribe(&self, subscriber_id: SubscriberId) {
        self.listeners.write().retain(|(id, _)| *id != subscriber_id);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Run `f` under the write lock, then publish the change set it returns.
    fn apply<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Vec<Value>) -> (R, Vec<ArrayChange>),
    {
        let (result, changes) = f(&mut *self.items.write());

        if !changes.is_empty() {
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

        result
    }
}

impl From<Vec<Value>> for ObservableArray {
    fn from(items: Vec<Value>) -> Self {
        Self::new(items)
    }
}

impl std::fmt::Debug for ObservableArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableArray")
            .field("items", &*self.items.read())
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::ChangeStatus;
    use parking_lot::Mutex;
    use serde_json::json;

    fn recording(array: &ObservableArray) -> Arc<Mutex<Vec<Vec<ArrayChange>>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        array.subscribe_changes(SubscriberId::new(), move |changes| {
            sink.lock().push(changes.to_vec());
        });
        log
    }

    #[test]
    fn push_reports_an_add() {
        let array = ObservableArray::new(vec![json!("a")]);
        let log = recording(&array);

        array.push(json!("b"));

        assert_eq!(array.snapshot(), vec![json!("a"), json!("b")]);
        assert_eq!(*log.lock(), vec![vec![ArrayChange::added(1, json!("b"))]]);
    }

    #[test]
    fn shift_and_pop_report_deletes() {
        let array = ObservableArray::new(vec![json!(1), json!(2), json!(3)]);
        let log = recording(&array);

        assert_eq!(array.shift(), Some(json!(1)));
        assert_eq!(array.pop(), Some(json!(3)));

        let log = log.lock();
        assert_eq!(log[0], vec![ArrayChange::deleted(0, json!(1))]);
        assert_eq!(log[1], vec![ArrayChange::deleted(1, json!(3))]);
    }

    #[test]
    fn empty_shift_publishes_nothing() {
        let array = ObservableArray::default();
        let log = recording(&array);

        assert_eq!(array.shift(), None);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn splice_inserts_in_the_middle() {
        let array = ObservableArray::new(vec![json!("a"), json!("b")]);
        let log = recording(&array);

        let removed = array.splice(1, 0, [json!("c")]);

        assert!(removed.is_empty());
        assert_eq!(array.snapshot(), vec![json!("a"), json!("c"), json!("b")]);
        assert_eq!(log.lock()[0][0].status, ChangeStatus::Added);
        assert_eq!(log.lock()[0][0].index, 1);
    }

    #[test]
    fn splice_reports_old_and_new_positions() {
        let array = ObservableArray::new(vec![json!("a"), json!("b"), json!("c"), json!("d")]);
        let log = recording(&array);

        let removed = array.splice(1, 2, [json!("x"), json!("c")]);

        assert_eq!(removed, vec![json!("b"), json!("c")]);
        assert_eq!(
            log.lock()[0],
            vec![
                ArrayChange::deleted(1, json!("b")),
                ArrayChange::deleted(2, json!("c")),
                ArrayChange::added(1, json!("x")),
                ArrayChange::added(2, json!("c")),
            ]
        );
    }

    #[test]
    fn large_list_push_reports_one_change() {
        let array = ObservableArray::new((0..50_000).map(|v| json!(v)).collect());
        let log = recording(&array);

        array.push(json!(-1));
        array.insert(25_000, json!("mid"));
        array.remove(0);

        let log = log.lock();
        assert_eq!(log[0], vec![ArrayChange::added(50_000, json!(-1))]);
        assert_eq!(log[1], vec![ArrayChange::added(25_000, json!("mid"))]);
        assert_eq!(log[2], vec![ArrayChange::deleted(0, json!(0))]);
        assert_eq!(array.len(), 50_001);
    }

    #[test]
    fn out_of_range_remove_publishes_nothing() {
        let array = ObservableArray::new(vec![json!(1)]);
        let log = recording(&array);

        assert_eq!(array.remove(3), None);
        assert_eq!(array.pop(), Some(json!(1)));
        assert_eq!(array.pop(), None);

        assert_eq!(*log.lock(), vec![vec![ArrayChange::deleted(0, json!(1))]]);
    }

    #[test]
    fn unsubscribed_listener_is_not_called() {
        let array = ObservableArray::default();
        let calls = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&calls);
        let id = SubscriberId::new();
        array.subscribe_changes(id, move |_| *sink.lock() += 1);

        array.push(json!(1));
        array.unsubscribe(id);
        array.push(json!(2));

        assert_eq!(*calls.lock(), 1);
        assert_eq!(array.listener_count(), 0);
    }

    #[test]
    fn listener_can_read_the_array() {
        let array = ObservableArray::default();
        let reader = array.clone();
        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        array.subscribe_changes(SubscriberId::new(), move |_| *sink.lock() = reader.len());

        array.replace(vec![json!(1), json!(2)]);
        assert_eq!(*seen.lock(), 2);
    }
}
