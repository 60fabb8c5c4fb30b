//! Tracking Scope
//!
//! A tracking scope records which signals a computation reads while it runs.
//! `ComputedList` uses it to learn what to re-evaluate on.
//!
//! # Implementation
//!
//! A thread-local stack holds one entry per running computation. Entering a
//! scope pushes an entry, dropping the guard pops it. Nested computations
//! each see only their own reads.

use std::cell::RefCell;

use super::SubscriberId;

thread_local! {
    static SCOPE_STACK: RefCell<Vec<ScopeEntry>> = const { RefCell::new(Vec::new()) };
}

#[derive(Debug, Clone)]
struct ScopeEntry {
    subscriber_id: SubscriberId,
    /// Signal IDs read so far, in first-read order.
    dependencies: Vec<u64>,
}

/// Guard for an active tracking scope. Pops the scope when dropped.
pub struct TrackingScope {
    subscriber_id: SubscriberId,
}

impl TrackingScope {
    /// Enter a new tracking scope for the given subscriber.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        SCOPE_STACK.with(|stack| {
            stack.borrow_mut().push(ScopeEntry {
                subscriber_id,
                dependencies: Vec::new(),
            });
        });

        Self { subscriber_id }
    }

    /// Check if any tracking scope is active on this thread.
    pub fn is_active() -> bool {
        SCOPE_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The subscriber of the innermost scope, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        SCOPE_STACK.with(|stack| stack.borrow().last().map(|entry| entry.subscriber_id))
    }

    /// Record a read of the given signal in the innermost scope.
    ///
    /// Repeated reads of the same signal are recorded once.
    pub fn track_dependency(signal_id: u64) {
        SCOPE_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if !entry.dependencies.contains(&signal_id) {
                    entry.dependencies.push(signal_id);
                }
            }
        });
    }

    /// Signal IDs read so far in the innermost scope.
    pub fn dependencies() -> Vec<u64> {
        SCOPE_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.clone())
                .unwrap_or_default()
        })
    }
}

impl Drop for TrackingScope {
    fn drop(&mut self) {
        SCOPE_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber_id, self.subscriber_id,
                    "TrackingScope mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, entry.subscriber_id
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_tracks_subscriber() {
        let id = SubscriberId::new();

        assert!(!TrackingScope::is_active());
        {
            let _scope = TrackingScope::enter(id);
            assert!(TrackingScope::is_active());
            assert_eq!(TrackingScope::current_subscriber(), Some(id));
        }
        assert!(!TrackingScope::is_active());
        assert!(TrackingScope::current_subscriber().is_none());
    }

    #[test]
    fn repeated_reads_are_recorded_once() {
        let _scope = TrackingScope::enter(SubscriberId::new());

        TrackingScope::track_dependency(7);
        TrackingScope::track_dependency(3);
        TrackingScope::track_dependency(7);

        assert_eq!(TrackingScope::dependencies(), vec![7, 3]);
    }

    #[test]
    fn nested_scopes_keep_separate_reads() {
        let outer = SubscriberId::new();
        let inner = SubscriberId::new();

        let _outer_scope = TrackingScope::enter(outer);
        TrackingScope::track_dependency(1);
        {
            let _inner_scope = TrackingScope::enter(inner);
            TrackingScope::track_dependency(2);
            assert_eq!(TrackingScope::dependencies(), vec![2]);
        }
        assert_eq!(TrackingScope::current_subscriber(), Some(outer));
        assert_eq!(TrackingScope::dependencies(), vec![1]);
    }
}
