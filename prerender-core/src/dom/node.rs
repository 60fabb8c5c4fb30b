//! Document Nodes
//!
//! Node identities and payloads stored in the document arena.

use indexmap::IndexMap;

/// Handle to a node inside one `Document`.
///
/// Ids are only meaningful for the document that created them. Removing a
/// node frees its slot, and a later node may be given the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Get the raw arena slot.
    pub fn raw(&self) -> usize {
        self.0
    }
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// An element with a lowercase tag name and attributes in source order.
    Element {
        tag: String,
        attributes: IndexMap<String, String>,
    },
    /// A text node.
    Text(String),
    /// A comment node. Virtual elements are delimited by these.
    Comment(String),
}

impl NodeKind {
    pub fn element(tag: impl Into<String>) -> Self {
        NodeKind::Element {
            tag: tag.into(),
            attributes: IndexMap::new(),
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self, NodeKind::Element { .. })
    }
}

/// One arena slot.
#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Set while the slot sits on the free list.
    pub(crate) released: bool,
}

impl NodeData {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            released: false,
        }
    }

    fn vacant() -> Self {
        Self {
            released: true,
            ..Self::new(NodeKind::Text(String::new()))
        }
    }

    /// Empty the slot, handing back its children.
    pub(crate) fn release(&mut self) -> Vec<NodeId> {
        std::mem::replace(self, Self::vacant()).children
    }
}

/// A structural change, as recorded by `Document::record_mutations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Inserted { parent: NodeId, node: NodeId },
    Removed { parent: NodeId, node: NodeId },
}

impl Mutation {
    pub fn is_removal(&self) -> bool {
        matches!(self, Mutation::Removed { .. })
    }
}
