//! Document
//!
//! An arena-backed node tree shared through a cheap, cloneable handle.
//!
//! Every method takes the internal lock for the duration of one call only.
//! Nothing user-supplied ever runs while the lock is held: disposal
//! callbacks collected by `remove_node` are invoked after it is released.
//! That lets a callback (or a signal subscriber writing text) call back
//! into the document freely.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::RwLock;

use super::node::{Mutation, NodeData, NodeId, NodeKind};

/// Callback run once when its node, or an ancestor, is removed.
pub type DisposeCallback = Box<dyn FnOnce() + Send + Sync>;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

#[derive(Default)]
struct Tree {
    nodes: Vec<NodeData>,
    free: Vec<usize>,
    dispose: HashMap<NodeId, Vec<DisposeCallback>>,
    mutations: Option<Vec<Mutation>>,
}

impl Tree {
    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        if let Some(slot) = self.free.pop() {
            self.nodes[slot] = NodeData::new(kind);
            return NodeId(slot);
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData::new(kind));
        id
    }

    /// Put a detached subtree's slots on the free list. Its disposal
    /// callbacks must already have been taken.
    fn release(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let slot = self.node_mut(current);
            if slot.released {
                continue;
            }
            stack.extend(slot.release());
            self.free.push(current.0);
        }
    }

    fn position(&self, node: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.node(node).parent?;
        let index = self.node(parent).children.iter().position(|c| *c == node)?;
        Some((parent, index))
    }

    /// Unlink a node from its parent. Not recorded as a mutation.
    fn detach(&mut self, node: NodeId) -> Option<NodeId> {
        let (parent, index) = self.position(node)?;
        self.node_mut(parent).children.remove(index);
        self.node_mut(node).parent = None;
        Some(parent)
    }

    fn insert_at(&mut self, parent: NodeId, index: usize, node: NodeId) {
        self.detach(node);
        let index = index.min(self.node(parent).children.len());
        self.node_mut(parent).children.insert(index, node);
        self.node_mut(node).parent = Some(parent);
        if let Some(log) = self.mutations.as_mut() {
            log.push(Mutation::Inserted { parent, node });
        }
    }

    fn descendants_inclusive(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.node(current).children.iter().rev().copied());
        }
        out
    }

    fn take_dispose_callbacks(&mut self, node: NodeId) -> Vec<DisposeCallback> {
        self.descendants_inclusive(node)
            .into_iter()
            .filter_map(|id| self.dispose.remove(&id))
            .flatten()
            .collect()
    }

    fn deep_clone(&mut self, node: NodeId) -> NodeId {
        let kind = self.node(node).kind.clone();
        let copy = self.push(kind);
        let children = self.node(node).children.clone();
        for child in children {
            let child_copy = self.deep_clone(child);
            self.node_mut(child_copy).parent = Some(copy);
            self.node_mut(copy).children.push(child_copy);
        }
        copy
    }

    fn text_content(&self, node: NodeId, out: &mut String) {
        match &self.node(node).kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Comment(_) => {}
            NodeKind::Element { .. } => {
                for child in &self.node(node).children {
                    self.text_content(*child, out);
                }
            }
        }
    }

    fn serialize(&self, node: NodeId, out: &mut String) {
        match &self.node(node).kind {
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Comment(text) => {
                let _ = write!(out, "<!--{text}-->");
            }
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    let _ = write!(out, " {name}=\"{}\"", escape_attribute(value));
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for child in &self.node(node).children {
                    self.serialize(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// Shared handle to a node tree.
///
/// A fresh document owns a detached-from-nothing `<body>` root; content
/// reachable from it is what `get_element_by_id` searches.
#[derive(Clone)]
pub struct Document {
    tree: Arc<RwLock<Tree>>,
    body: NodeId,
}

impl Document {
    pub fn new() -> Self {
        let mut tree = Tree::default();
        let body = tree.push(NodeKind::element("body"));
        Self {
            tree: Arc::new(RwLock::new(tree)),
            body,
        }
    }

    /// The root element.
    pub fn body(&self) -> NodeId {
        self.body
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    pub fn create_node(&self, kind: NodeKind) -> NodeId {
        self.tree.write().push(kind)
    }

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.create_node(NodeKind::element(tag.to_ascii_lowercase()))
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        self.create_node(NodeKind::Text(text.to_string()))
    }

    pub fn create_comment(&self, text: &str) -> NodeId {
        self.create_node(NodeKind::Comment(text.to_string()))
    }

    /// Copy a node. Deep clones copy the whole subtree; the copy is detached
    /// and carries no disposal callbacks.
    pub fn clone_node(&self, node: NodeId, deep: bool) -> NodeId {
        let mut tree = self.tree.write();
        if deep {
            tree.deep_clone(node)
        } else {
            let kind = tree.node(node).kind.clone();
            tree.push(kind)
        }
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn kind(&self, node: NodeId) -> NodeKind {
        self.tree.read().node(node).kind.clone()
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.tree.read().node(node).kind.is_element()
    }

    /// Lowercase tag name of an element.
    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        match &self.tree.read().node(node).kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    pub fn comment_text(&self, node: NodeId) -> Option<String> {
        match &self.tree.read().node(node).kind {
            NodeKind::Comment(text) => Some(text.clone()),
            _ => None,
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.tree.read().node(node).kind {
            NodeKind::Element { attributes, .. } => attributes.get(name).cloned(),
            _ => None,
        }
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        match &self.tree.read().node(node).kind {
            NodeKind::Element { attributes, .. } => attributes.contains_key(name),
            _ => false,
        }
    }

    /// Set an attribute. Ignored for non-element nodes.
    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attributes, .. } = &mut self.tree.write().node_mut(node).kind {
            attributes.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        if let NodeKind::Element { attributes, .. } = &mut self.tree.write().node_mut(node).kind {
            attributes.shift_remove(name);
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree.read().node(node).parent
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree.read().node(node).children.clone()
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.tree.read().node(node).children.first().copied()
    }

    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.tree.read().node(node).children.last().copied()
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let tree = self.tree.read();
        let (parent, index) = tree.position(node)?;
        tree.node(parent).children.get(index + 1).copied()
    }

    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let tree = self.tree.read();
        let (parent, index) = tree.position(node)?;
        index
            .checked_sub(1)
            .and_then(|prev| tree.node(parent).children.get(prev).copied())
    }

    /// The next sibling that is an element, skipping text and comments.
    pub fn next_element_sibling(&self, node: NodeId) -> Option<NodeId> {
        let tree = self.tree.read();
        let (parent, index) = tree.position(node)?;
        tree.node(parent).children[index + 1..]
            .iter()
            .copied()
            .find(|sibling| tree.node(*sibling).kind.is_element())
    }

    /// True when `node` is `ancestor` or lies beneath it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let tree = self.tree.read();
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = tree.node(id).parent;
        }
        false
    }

    /// Find an element by its `id` attribute under the body.
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        let tree = self.tree.read();
        tree.descendants_inclusive(self.body).into_iter().find(|node| {
            matches!(
                &tree.node(*node).kind,
                NodeKind::Element { attributes, .. } if attributes.get("id").map(String::as_str) == Some(id)
            )
        })
    }

    pub fn text_content(&self, node: NodeId) -> String {
        let tree = self.tree.read();
        let mut out = String::new();
        match &tree.node(node).kind {
            NodeKind::Comment(text) => out.push_str(text),
            _ => tree.text_content(node, &mut out),
        }
        out
    }

    /// Markup of the node's children.
    pub fn inner_html(&self, node: NodeId) -> String {
        let tree = self.tree.read();
        let mut out = String::new();
        for child in &tree.node(node).children {
            tree.serialize(*child, &mut out);
        }
        out
    }

    /// Markup of the node itself.
    pub fn outer_html(&self, node: NodeId) -> String {
        let tree = self.tree.read();
        let mut out = String::new();
        tree.serialize(node, &mut out);
        out
    }

    /// Number of nodes alive in the arena, attached or not.
    pub fn node_count(&self) -> usize {
        let tree = self.tree.read();
        tree.nodes.len() - tree.free.len()
    }

    /// Arena slots allocated so far, including freed ones awaiting reuse.
    pub fn slot_count(&self) -> usize {
        self.tree.read().nodes.len()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    pub fn append_child(&self, parent: NodeId, node: NodeId) {
        let mut tree = self.tree.write();
        let end = tree.node(parent).children.len();
        tree.insert_at(parent, end, node);
    }

    /// Insert `node` before `reference`, or at the end when `reference` is
    /// `None` or not a child of `parent`.
    pub fn insert_before(&self, parent: NodeId, node: NodeId, reference: Option<NodeId>) {
        let mut tree = self.tree.write();
        tree.detach(node);
        let index = reference
            .and_then(|r| tree.node(parent).children.iter().position(|c| *c == r))
            .unwrap_or(tree.node(parent).children.len());
        tree.insert_at(parent, index, node);
    }

    /// Insert `node` directly after `reference`, or as the first child when
    /// `reference` is `None`.
    pub fn insert_after(&self, parent: NodeId, node: NodeId, reference: Option<NodeId>) {
        let mut tree = self.tree.write();
        tree.detach(node);
        let index = match reference {
            Some(r) => tree
                .node(parent)
                .children
                .iter()
                .position(|c| *c == r)
                .map_or(tree.node(parent).children.len(), |i| i + 1),
            None => 0,
        };
        tree.insert_at(parent, index, node);
    }

    /// Detach a node, run the disposal callbacks of its subtree and free
    /// the subtree's slots.
    ///
    /// Ids of removed nodes must not be used again. To move a node, insert
    /// it somewhere else instead.
    pub fn remove_node(&self, node: NodeId) {
        let callbacks = {
            let mut tree = self.tree.write();
            if let Some(parent) = tree.detach(node) {
                if let Some(log) = tree.mutations.as_mut() {
                    log.push(Mutation::Removed { parent, node });
                }
            }
            let callbacks = tree.take_dispose_callbacks(node);
            if node != self.body {
                tree.release(node);
            }
            callbacks
        };
        for callback in callbacks {
            callback();
        }
    }

    /// Replace an element's children with a single text node, or rewrite
    /// the data of a text or comment node.
    pub fn set_text_content(&self, node: NodeId, text: &str) {
        let callbacks = {
            let mut tree = self.tree.write();
            if let NodeKind::Text(data) | NodeKind::Comment(data) = &mut tree.node_mut(node).kind {
                *data = text.to_string();
                return;
            }
            let old = std::mem::take(&mut tree.node_mut(node).children);
            let mut callbacks = Vec::new();
            for child in old {
                tree.node_mut(child).parent = None;
                callbacks.extend(tree.take_dispose_callbacks(child));
                tree.release(child);
            }
            if !text.is_empty() {
                let text_node = tree.push(NodeKind::Text(text.to_string()));
                tree.node_mut(text_node).parent = Some(node);
                tree.node_mut(node).children.push(text_node);
            }
            callbacks
        };
        for callback in callbacks {
            callback();
        }
    }

    /// Run `callback` once when `node` (or an ancestor) is removed.
    pub fn add_dispose_callback<F>(&self, node: NodeId, callback: F)
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        self.tree
            .write()
            .dispose
            .entry(node)
            .or_default()
            .push(Box::new(callback));
    }

    /// Start or stop recording inserts and removals.
    pub fn record_mutations(&self, enabled: bool) {
        self.tree.write().mutations = enabled.then(Vec::new);
    }

    /// Drain the recorded mutations.
    pub fn take_mutations(&self) -> Vec<Mutation> {
        self.tree
            .write()
            .mutations
            .as_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.node_count())
            .field("body", &self.outer_html(self.body))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn list(doc: &Document, items: &[&str]) -> (NodeId, Vec<NodeId>) {
        let ul = doc.create_element("ul");
        let lis = items
            .iter()
            .map(|text| {
                let li = doc.create_element("li");
                doc.set_text_content(li, text);
                doc.append_child(ul, li);
                li
            })
            .collect();
        (ul, lis)
    }

    #[test]
    fn serializes_elements_and_attributes() {
        let doc = Document::new();
        let (ul, lis) = list(&doc, &["a", "b"]);
        doc.set_attribute(lis[0], "data-init", "");

        assert_eq!(
            doc.outer_html(ul),
            "<ul><li data-init=\"\">a</li><li>b</li></ul>"
        );
    }

    #[test]
    fn insert_after_none_prepends() {
        let doc = Document::new();
        let (ul, lis) = list(&doc, &["a", "b"]);
        let c = doc.create_element("li");

        doc.insert_after(ul, c, None);
        assert_eq!(doc.children(ul), vec![c, lis[0], lis[1]]);

        let d = doc.create_element("li");
        doc.insert_after(ul, d, Some(lis[0]));
        assert_eq!(doc.children(ul), vec![c, lis[0], d, lis[1]]);
    }

    #[test]
    fn sibling_navigation() {
        let doc = Document::new();
        let (_, lis) = list(&doc, &["a", "b", "c"]);

        assert_eq!(doc.next_sibling(lis[0]), Some(lis[1]));
        assert_eq!(doc.previous_sibling(lis[0]), None);
        assert_eq!(doc.previous_sibling(lis[2]), Some(lis[1]));
        assert_eq!(doc.next_element_sibling(lis[1]), Some(lis[2]));
    }

    #[test]
    fn deep_clone_is_detached_copy() {
        let doc = Document::new();
        let (ul, _) = list(&doc, &["a"]);

        let copy = doc.clone_node(ul, true);
        assert_ne!(copy, ul);
        assert_eq!(doc.parent(copy), None);
        assert_eq!(doc.outer_html(copy), doc.outer_html(ul));
    }

    #[test]
    fn removal_runs_dispose_callbacks_of_descendants() {
        let doc = Document::new();
        let (ul, lis) = list(&doc, &["a"]);
        doc.append_child(doc.body(), ul);
        let disposed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&disposed);
        doc.add_dispose_callback(lis[0], move || flag.store(true, Ordering::SeqCst));

        doc.remove_node(ul);

        assert!(disposed.load(Ordering::SeqCst));
        assert!(doc.children(doc.body()).is_empty());
    }

    #[test]
    fn dispose_callback_may_use_the_document() {
        let doc = Document::new();
        let (ul, _) = list(&doc, &["a"]);
        doc.append_child(doc.body(), ul);
        let handle = doc.clone();
        let body = doc.body();
        doc.add_dispose_callback(ul, move || {
            let marker = handle.create_comment("gone");
            handle.append_child(body, marker);
        });

        doc.remove_node(ul);
        assert_eq!(doc.inner_html(body), "<!--gone-->");
    }

    #[test]
    fn text_content_skips_comments() {
        let doc = Document::new();
        let div = doc.create_element("div");
        let comment = doc.create_comment(" ko ");
        let text = doc.create_text("x < y");
        doc.append_child(div, comment);
        doc.append_child(div, text);

        assert_eq!(doc.text_content(div), "x < y");
        assert_eq!(doc.inner_html(div), "<!-- ko -->x &lt; y");
    }

    #[test]
    fn finds_elements_by_id_under_body_only() {
        let doc = Document::new();
        let attached = doc.create_element("template");
        doc.set_attribute(attached, "id", "row");
        doc.append_child(doc.body(), attached);
        let detached = doc.create_element("div");
        doc.set_attribute(detached, "id", "loose");

        assert_eq!(doc.get_element_by_id("row"), Some(attached));
        assert_eq!(doc.get_element_by_id("loose"), None);
    }

    #[test]
    fn records_inserts_and_removals() {
        let doc = Document::new();
        let (ul, lis) = list(&doc, &["a"]);
        doc.record_mutations(true);

        doc.remove_node(lis[0]);
        let li = doc.create_element("li");
        doc.append_child(ul, li);

        assert_eq!(
            doc.take_mutations(),
            vec![
                Mutation::Removed { parent: ul, node: lis[0] },
                Mutation::Inserted { parent: ul, node: li },
            ]
        );
        assert!(doc.take_mutations().is_empty());
    }

    #[test]
    fn removed_subtree_slots_are_reused() {
        let doc = Document::new();
        let (ul, _) = list(&doc, &["a", "b"]);
        doc.append_child(doc.body(), ul);
        let live = doc.node_count();
        let slots = doc.slot_count();

        doc.remove_node(ul);
        assert_eq!(doc.node_count(), live - 5);

        let (again, _) = list(&doc, &["c", "d"]);
        doc.append_child(doc.body(), again);
        assert_eq!(doc.slot_count(), slots);
        assert_eq!(doc.outer_html(again), "<ul><li>c</li><li>d</li></ul>");
    }

    #[test]
    fn removing_twice_frees_once() {
        let doc = Document::new();
        let a = doc.create_element("p");
        doc.append_child(doc.body(), a);

        doc.remove_node(a);
        doc.remove_node(a);

        let first = doc.create_element("i");
        let second = doc.create_element("b");
        assert_ne!(first, second);
        assert_eq!(doc.node_count(), 3);
    }

    #[test]
    fn replaced_text_is_freed() {
        let doc = Document::new();
        let p = doc.create_element("p");
        doc.set_text_content(p, "one");
        let slots = doc.slot_count();

        for round in 0..100 {
            doc.set_text_content(p, &round.to_string());
        }

        assert_eq!(doc.slot_count(), slots);
        assert_eq!(doc.text_content(p), "99");
    }

    #[test]
    fn void_elements_have_no_closing_tag() {
        let doc = Document::new();
        let input = doc.create_element("input");
        doc.set_attribute(input, "value", "London");
        assert_eq!(doc.outer_html(input), "<input value=\"London\">");
    }
}
