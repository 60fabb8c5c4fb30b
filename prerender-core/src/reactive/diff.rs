//! Array Diffing
//!
//! Computes the sparse change set between two versions of a list: which
//! positions were added and which were deleted. Retained items are not
//! reported.
//!
//! # Algorithm
//!
//! The common prefix and suffix are skipped first, so only the changed middle
//! of the lists costs anything. Over that middle, an insert/delete
//! edit-distance table is filled bottom-up and walked back from the
//! bottom-right corner. The walk yields changes from the end of the
//! lists towards the start, so the result is reversed once at the end.
//!
//! Index conventions match what the list binding expects:
//! - `Deleted` entries carry their position in the **old** list
//! - `Added` entries carry their position in the **new** list
//!
//! Within each status, entries come out in ascending index order.

use serde::Serialize;
use serde_json::Value;

/// The kind of a single list change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeStatus {
    /// The value appeared at `index` in the new list.
    Added,
    /// The value was already rendered in markup at `index` (priming only).
    Existing,
    /// The value at `index` in the old list is gone.
    Deleted,
}

/// One entry of a diff.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayChange {
    pub status: ChangeStatus,
    pub value: Value,
    pub index: usize,
}

impl ArrayChange {
    pub fn added(index: usize, value: Value) -> Self {
        Self { status: ChangeStatus::Added, value, index }
    }

    pub fn existing(index: usize, value: Value) -> Self {
        Self { status: ChangeStatus::Existing, value, index }
    }

    pub fn deleted(index: usize, value: Value) -> Self {
        Self { status: ChangeStatus::Deleted, value, index }
    }
}

/// Compare two lists and return the added/deleted entries between them.
pub fn compare_arrays(old: &[Value], new: &[Value]) -> Vec<ArrayChange> {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let old_middle = &old[prefix..old.len() - suffix];
    let new_middle = &new[prefix..new.len() - suffix];

    if old_middle.is_empty() {
        return new_middle
            .iter()
            .enumerate()
            .map(|(j, value)| ArrayChange::added(prefix + j, value.clone()))
            .collect();
    }
    if new_middle.is_empty() {
        return old_middle
            .iter()
            .enumerate()
            .map(|(i, value)| ArrayChange::deleted(prefix + i, value.clone()))
            .collect();
    }

    let mut script = edit_script(old_middle, new_middle);
    for change in &mut script {
        change.index += prefix;
    }
    script
}

fn edit_script(old: &[Value], new: &[Value]) -> Vec<ArrayChange> {
    let rows = old.len() + 1;
    let cols = new.len() + 1;
    let at = |i: usize, j: usize| i * cols + j;

    // distance[i][j]: inserts + deletes turning old[..i] into new[..j]
    let mut distance = vec![0usize; rows * cols];
    for i in 0..rows {
        distance[at(i, 0)] = i;
    }
    for j in 0..cols {
        distance[at(0, j)] = j;
    }
    for i in 1..rows {
        for j in 1..cols {
            distance[at(i, j)] = if old[i - 1] == new[j - 1] {
                distance[at(i - 1, j - 1)]
            } else {
                1 + distance[at(i - 1, j)].min(distance[at(i, j - 1)])
            };
        }
    }

    let mut script = Vec::with_capacity(distance[at(rows - 1, cols - 1)]);
    let (mut i, mut j) = (old.len(), new.len());
    while i > 0 || j > 0 {
        let here = distance[at(i, j)];
        if i > 0 && j > 0 && old[i - 1] == new[j - 1] && here == distance[at(i - 1, j - 1)] {
            i -= 1;
            j -= 1;
        } else if j > 0 && here == distance[at(i, j - 1)] + 1 {
            j -= 1;
            script.push(ArrayChange::added(j, new[j].clone()));
        } else {
            i -= 1;
            script.push(ArrayChange::deleted(i, old[i].clone()));
        }
    }

    script.reverse();
    script
}
