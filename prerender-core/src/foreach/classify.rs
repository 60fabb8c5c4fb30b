//! Change Classification
//!
//! Buckets a diff by status and lays it out as queue operations: every
//! delete first, then one `ClearDeletedIndexes` if anything was deleted,
//! then retained (`Existing`) items, then additions. Additions address
//! anchors by post-delete position, so this order is required.

use serde::Serialize;
use serde_json::Value;

use crate::reactive::{ArrayChange, ChangeStatus};

/// A diff grouped by status. Entries keep the order they arrived in.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeMap {
    pub added: Vec<ArrayChange>,
    pub existing: Vec<ArrayChange>,
    pub deleted: Vec<ArrayChange>,
}

impl ChangeMap {
    pub fn classify(changes: &[ArrayChange]) -> Self {
        let mut map = Self::default();
        for change in changes {
            let bucket = match change.status {
                ChangeStatus::Added => &mut map.added,
                ChangeStatus::Existing => &mut map.existing,
                ChangeStatus::Deleted => &mut map.deleted,
            };
            bucket.push(change.clone());
        }
        map
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.existing.len() + self.deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The operations to queue for this change set.
    pub fn into_queue(self) -> Vec<QueuedChange> {
        let has_deletes = !self.deleted.is_empty();
        let mut queue = Vec::with_capacity(self.len() + usize::from(has_deletes));

        queue.extend(
            self.deleted
                .into_iter()
                .map(|c| QueuedChange::Deleted { index: c.index, value: c.value }),
        );
        if has_deletes {
            queue.push(QueuedChange::ClearDeletedIndexes);
        }
        queue.extend(
            self.existing
                .into_iter()
                .map(|c| QueuedChange::Existing { index: c.index, value: c.value }),
        );
        queue.extend(
            self.added
                .into_iter()
                .map(|c| QueuedChange::Added { index: c.index, value: c.value }),
        );
        queue
    }
}

/// One pending list operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum QueuedChange {
    /// Remove the item's nodes; the bookkeeping entry goes on the next clear.
    Deleted { index: usize, value: Value },
    /// Compact bookkeeping after a run of deletes and renumber `$index`.
    ClearDeletedIndexes,
    /// Bind a pre-rendered item.
    Existing { index: usize, value: Value },
    /// Render a new item from the template.
    Added { index: usize, value: Value },
}

impl QueuedChange {
    pub fn index(&self) -> Option<usize> {
        match self {
            QueuedChange::Deleted { index, .. }
            | QueuedChange::Existing { index, .. }
            | QueuedChange::Added { index, .. } => Some(*index),
            QueuedChange::ClearDeletedIndexes => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            QueuedChange::Deleted { value, .. }
            | QueuedChange::Existing { value, .. }
            | QueuedChange::Added { value, .. } => Some(value),
            QueuedChange::ClearDeletedIndexes => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            QueuedChange::Deleted { .. } => "deleted",
            QueuedChange::ClearDeletedIndexes => "clearDeletedIndexes",
            QueuedChange::Existing { .. } => "existing",
            QueuedChange::Added { .. } => "added",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn deletes_come_first_then_clear_then_existing_then_added() {
        let diff = vec![
            ArrayChange::added(0, json!("b")),
            ArrayChange::deleted(1, json!("x")),
            ArrayChange::existing(0, json!("a")),
            ArrayChange::deleted(3, json!("y")),
            ArrayChange::added(2, json!("c")),
        ];

        let queue = ChangeMap::classify(&diff).into_queue();
        let statuses: Vec<&str> = queue.iter().map(QueuedChange::status).collect();

        assert_eq!(
            statuses,
            vec!["deleted", "deleted", "clearDeletedIndexes", "existing", "added", "added"]
        );
        assert_eq!(queue[0].index(), Some(1));
        assert_eq!(queue[1].index(), Some(3));
        assert_eq!(queue[4].index(), Some(0));
        assert_eq!(queue[5].index(), Some(2));
    }

    #[test]
    fn no_clear_without_deletes() {
        let diff = vec![ArrayChange::added(0, json!(1))];
        let queue = ChangeMap::classify(&diff).into_queue();
        assert_eq!(queue, vec![QueuedChange::Added { index: 0, value: json!(1) }]);
    }

    #[test]
    fn empty_diff_queues_nothing() {
        let map = ChangeMap::classify(&[]);
        assert!(map.is_empty());
        assert!(map.into_queue().is_empty());
    }

    #[test]
    fn serializes_with_status_tag() {
        let change = QueuedChange::Deleted { index: 2, value: json!("z") };
        assert_eq!(
            serde_json::to_value(&change).expect("serialize"),
            json!({"status": "deleted", "index": 2, "value": "z"})
        );
        assert_eq!(
            serde_json::to_value(QueuedChange::ClearDeletedIndexes).expect("serialize"),
            json!({"status": "clearDeletedIndexes"})
        );
    }
}
