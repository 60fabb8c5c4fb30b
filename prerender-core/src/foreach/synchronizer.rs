//! List Synchronizer
//!
//! Owns the mapping from item position to rendered nodes and item scope,
//! and applies queued operations to the document.
//!
//! # Bookkeeping
//!
//! - `anchors[i]` is the last node of item `i`'s span. The next item is
//!   inserted right after it. `None` stands for the start of the region and
//!   only appears between a delete and the following clear.
//! - `items[i]` is item `i`'s binding context and its `$index` cell.
//! - `pending_deletes` holds positions deleted since the last clear.
//!
//! Outside a flush `anchors.len() == items.len() == collection length`.
//!
//! # Deletes
//!
//! A delete removes nodes walking backwards from its own anchor to the
//! anchor before it, then copies that previous anchor into its own slot.
//! The next delete in the same run starts its walk from there, so adjacent
//! deletes chain without the bookkeeping being compacted in between.
//! Compaction and renumbering happen once, on `ClearDeletedIndexes`.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use smallvec::SmallVec;
use tracing::{trace, warn};

use super::classify::QueuedChange;
use super::template::TemplateFragment;
use crate::binding::{BindingContext, BindingProvider};
use crate::dom::{Document, NodeId, NodeSpan};
use crate::reactive::Signal;

type ItemNodes = SmallVec<[NodeId; 4]>;

/// Scope of one rendered item.
#[derive(Debug, Clone)]
struct ItemScope {
    context: Arc<BindingContext>,
    /// Owned `$index` cell. `None` for items bound without their own scope.
    index: Option<Signal<usize>>,
}

/// Everything a synchronizer needs from its binding.
pub struct SyncConfig {
    pub document: Document,
    pub host: Box<dyn NodeSpan>,
    pub template: TemplateFragment,
    pub existing_nodes: Vec<NodeId>,
    pub nodes_per_element: usize,
    pub parent: Arc<BindingContext>,
    pub binder: Arc<dyn BindingProvider>,
    pub alias: Option<String>,
    pub no_context: bool,
}

/// Applies list operations to one bound region.
pub struct ListSynchronizer {
    document: Document,
    host: Box<dyn NodeSpan>,
    template: TemplateFragment,
    existing_nodes: Vec<NodeId>,
    nodes_per_element: usize,
    parent: Arc<BindingContext>,
    binder: Arc<dyn BindingProvider>,
    alias: Option<String>,
    no_context: bool,
    anchors: Vec<Option<NodeId>>,
    items: Vec<ItemScope>,
    pending_deletes: BTreeSet<usize>,
}

impl ListSynchronizer {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            document: config.document,
            host: config.host,
            template: config.template,
            existing_nodes: config.existing_nodes,
            nodes_per_element: config.nodes_per_element.max(1),
            parent: config.parent,
            binder: config.binder,
            alias: config.alias,
            no_context: config.no_context,
            anchors: Vec::new(),
            items: Vec::new(),
            pending_deletes: BTreeSet::new(),
        }
    }

    /// Apply one queued operation.
    pub fn apply(&mut self, change: &QueuedChange) {
        trace!(status = change.status(), index = ?change.index(), "applying list change");
        match change {
            QueuedChange::Deleted { index, .. } => self.deleted(*index),
            QueuedChange::ClearDeletedIndexes => self.clear_deleted_indexes(),
            QueuedChange::Existing { index, value } => self.existing(*index, value.clone()),
            QueuedChange::Added { index, value } => self.added(*index, value.clone()),
        }
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn anchors(&self) -> &[Option<NodeId>] {
        &self.anchors
    }

    pub fn item_contexts(&self) -> Vec<Arc<BindingContext>> {
        self.items.iter().map(|item| Arc::clone(&item.context)).collect()
    }

    pub fn pending_deletes(&self) -> usize {
        self.pending_deletes.len()
    }

    /// Pre-rendered item nodes found at bind time.
    pub fn existing_nodes(&self) -> &[NodeId] {
        &self.existing_nodes
    }

    fn item_scope(&self, index: usize, value: Value) -> ItemScope {
        if self.no_context {
            return ItemScope {
                context: self.parent.extend("$item", value),
                index: None,
            };
        }
        let cell = Signal::new(index);
        ItemScope {
            context: self
                .parent
                .child(value, self.alias.as_deref(), Some(cell.clone())),
            index: Some(cell),
        }
    }

    fn record(&mut self, index: usize, anchor: NodeId, scope: ItemScope) {
        let index = index.min(self.anchors.len()).min(self.items.len());
        self.anchors.insert(index, Some(anchor));
        self.items.insert(index, scope);
    }

    /// Bind pre-rendered nodes for the item at `index`.
    fn existing(&mut self, index: usize, value: Value) {
        let start = index * self.nodes_per_element;
        let end = start + self.nodes_per_element;
        let Some(nodes) = self.existing_nodes.get(start..end) else {
            warn!(index, "no pre-rendered nodes for item; rendering it from the template");
            self.added(index, value);
            return;
        };
        let nodes: ItemNodes = nodes.iter().copied().collect();

        let scope = self.item_scope(index, value);
        for node in &nodes {
            self.binder.apply_bindings(&scope.context, &self.document, *node);
        }
        if let Some(last) = nodes.last() {
            self.record(index, *last, scope);
        }
    }

    /// Render the item at `index` from the template.
    ///
    /// Later items keep their `$index` here. Positions are refreshed only by
    /// `clear_deleted_indexes`, after a batch that deleted something.
    fn added(&mut self, index: usize, value: Value) {
        let index = index.min(self.anchors.len());
        let reference = index
            .checked_sub(1)
            .and_then(|previous| self.anchors.get(previous).copied().flatten());

        let clone = self.template.instantiate();
        let nodes: ItemNodes = self.document.children(clone).into_iter().collect();
        let Some(last) = nodes.last().copied() else {
            warn!(index, "item template produced no nodes; item skipped");
            self.document.remove_node(clone);
            return;
        };

        let scope = self.item_scope(index, value);
        self.binder
            .apply_bindings_to_descendants(&scope.context, &self.document, clone);

        // Reverse order: each node lands directly after the reference, in
        // front of the ones already inserted.
        for node in nodes.iter().rev() {
            self.host.insert_after(&self.document, *node, reference);
        }
        self.document.remove_node(clone);
        self.record(index, last, scope);
    }

    /// Remove the nodes of the item at `index`; compaction is deferred.
    fn deleted(&mut self, index: usize) {
        let Some(anchor) = self.anchors.get(index).copied() else {
            warn!(index, "delete for an unknown item ignored");
            return;
        };
        let previous = index
            .checked_sub(1)
            .and_then(|previous| self.anchors.get(previous).copied().flatten());

        if let Some(through) = anchor {
            self.host.remove_span(&self.document, previous, through);
        }
        self.anchors[index] = previous;
        self.pending_deletes.insert(index);
    }

    /// Splice out deleted positions, highest first, then renumber.
    fn clear_deleted_indexes(&mut self) {
        for index in self.pending_deletes.iter().rev().copied() {
            if index < self.anchors.len() {
                self.anchors.remove(index);
            }
            if index < self.items.len() {
                self.items.remove(index);
            }
        }
        self.pending_deletes.clear();

        for (position, item) in self.items.iter().enumerate() {
            if let Some(cell) = &item.index {
                if cell.get_untracked() != position {
                    cell.set(position);
                }
            }
        }
    }
}

impl std::fmt::Debug for ListSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListSynchronizer")
            .field("host", &self.host)
            .field("nodes_per_element", &self.nodes_per_element)
            .field("anchors", &self.anchors)
            .field("items", &self.items.len())
            .field("pending_deletes", &self.pending_deletes)
            .finish()
    }
}
