//! Node Spans
//!
//! A binding can be placed on an element or on a virtual element, a run of
//! siblings delimited by `<!-- ko ... -->` and `<!-- /ko -->` comments. Both
//! look the same to the list synchronizer through `NodeSpan`.

use std::fmt;

use tracing::trace;

use super::document::Document;
use super::node::NodeId;
use crate::error::{HydrateError, Result};

/// A contiguous region of sibling nodes that items are rendered into.
pub trait NodeSpan: Send + Sync + fmt::Debug {
    /// The nodes currently inside the region, in document order.
    fn child_nodes(&self, doc: &Document) -> Vec<NodeId>;

    /// Insert `node` directly after `reference`, or at the start of the
    /// region when `reference` is `None`.
    fn insert_after(&self, doc: &Document, node: NodeId, reference: Option<NodeId>);

    /// The node that precedes the region's content, if the region has one.
    fn start_marker(&self) -> Option<NodeId>;

    fn first_node(&self, doc: &Document) -> Option<NodeId> {
        self.child_nodes(doc).first().copied()
    }

    fn last_node(&self, doc: &Document) -> Option<NodeId> {
        self.child_nodes(doc).last().copied()
    }

    /// Remove `through` and every node before it, walking backwards until
    /// `after` (exclusive) or the start of the region is reached.
    ///
    /// Returns the number of nodes removed.
    fn remove_span(&self, doc: &Document, after: Option<NodeId>, through: NodeId) -> usize {
        let stop = after.or_else(|| self.start_marker());
        let mut removed = 0;
        let mut current = Some(through);
        while let Some(node) = current {
            if Some(node) == stop {
                break;
            }
            current = doc.previous_sibling(node);
            doc.remove_node(node);
            removed += 1;
        }
        trace!(removed, "removed span");
        removed
    }
}

/// The children of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementSpan {
    pub element: NodeId,
}

impl NodeSpan for ElementSpan {
    fn child_nodes(&self, doc: &Document) -> Vec<NodeId> {
        doc.children(self.element)
    }

    fn insert_after(&self, doc: &Document, node: NodeId, reference: Option<NodeId>) {
        doc.insert_after(self.element, node, reference);
    }

    fn start_marker(&self) -> Option<NodeId> {
        None
    }
}

/// The siblings strictly between a `ko` comment and its closing `/ko`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualRangeSpan {
    pub start: NodeId,
    pub end: NodeId,
}

impl VirtualRangeSpan {
    /// Find the closing comment for `start`, skipping nested pairs.
    pub fn from_start(doc: &Document, start: NodeId) -> Result<Self> {
        let mut depth = 0usize;
        let mut current = doc.next_sibling(start);
        while let Some(node) = current {
            if let Some(text) = doc.comment_text(node) {
                if is_start_comment(&text) {
                    depth += 1;
                } else if is_end_comment(&text) {
                    if depth == 0 {
                        return Ok(Self { start, end: node });
                    }
                    depth -= 1;
                }
            }
            current = doc.next_sibling(node);
        }
        Err(HydrateError::UnbalancedVirtualElement(start))
    }
}

impl NodeSpan for VirtualRangeSpan {
    fn child_nodes(&self, doc: &Document) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        let mut current = doc.next_sibling(self.start);
        while let Some(node) = current {
            if node == self.end {
                break;
            }
            nodes.push(node);
            current = doc.next_sibling(node);
        }
        nodes
    }

    fn insert_after(&self, doc: &Document, node: NodeId, reference: Option<NodeId>) {
        let Some(parent) = doc.parent(self.start) else {
            return;
        };
        doc.insert_after(parent, node, Some(reference.unwrap_or(self.start)));
    }

    fn start_marker(&self) -> Option<NodeId> {
        Some(self.start)
    }
}

/// True for `<!-- ko -->` and `<!-- ko foreach: items -->`.
pub fn is_start_comment(text: &str) -> bool {
    let text = text.trim();
    match text.strip_prefix("ko") {
        Some(rest) => rest.is_empty() || rest.starts_with(char::is_whitespace),
        None => false,
    }
}

/// True for `<!-- /ko -->`.
pub fn is_end_comment(text: &str) -> bool {
    text.trim() == "/ko"
}

/// Whether `node` opens a virtual element.
pub fn is_virtual_start(doc: &Document, node: NodeId) -> bool {
    doc.comment_text(node).is_some_and(|text| is_start_comment(&text))
}

/// The span a binding on `node` renders into.
pub fn span_for(doc: &Document, node: NodeId) -> Result<Box<dyn NodeSpan>> {
    if is_virtual_start(doc, node) {
        Ok(Box::new(VirtualRangeSpan::from_start(doc, node)?))
    } else {
        Ok(Box::new(ElementSpan { element: node }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_virtual_comments() {
        assert!(is_start_comment(" ko "));
        assert!(is_start_comment("ko foreachInit: items"));
        assert!(!is_start_comment("kowabunga"));
        assert!(!is_start_comment(" note "));
        assert!(is_end_comment(" /ko "));
        assert!(!is_end_comment(" /kox "));
    }

    #[test]
    fn virtual_span_matches_nested_close() {
        let doc = Document::from_html(
            "<!-- ko --><b>1</b><!-- ko --><i>2</i><!-- /ko --><b>3</b><!-- /ko --><p>after</p>",
        );
        let start = doc.first_child(doc.body()).expect("start comment");

        let span = VirtualRangeSpan::from_start(&doc, start).expect("balanced");
        let texts: Vec<String> = span
            .child_nodes(&doc)
            .into_iter()
            .map(|n| doc.text_content(n))
            .collect();

        assert_eq!(texts, vec!["1", "", "2", "", "3"]);
        assert_eq!(doc.next_sibling(span.end).and_then(|n| doc.tag_name(n)).as_deref(), Some("p"));
    }

    #[test]
    fn unbalanced_virtual_element_is_an_error() {
        let doc = Document::from_html("<!-- ko --><b>1</b>");
        let start = doc.first_child(doc.body()).expect("start comment");

        let err = span_for(&doc, start).unwrap_err();
        assert!(matches!(err, HydrateError::UnbalancedVirtualElement(n) if n == start));
    }

    #[test]
    fn virtual_insert_after_none_goes_after_the_opening_comment() {
        let doc = Document::from_html("<p>before</p><!-- ko --><!-- /ko -->");
        let start = doc.children(doc.body())[1];
        let span = span_for(&doc, start).expect("span");
        let node = doc.create_element("b");

        span.insert_after(&doc, node, None);

        assert_eq!(span.child_nodes(&doc), vec![node]);
        assert_eq!(doc.inner_html(doc.body()), "<p>before</p><!-- ko --><b></b><!-- /ko -->");
    }

    #[test]
    fn remove_span_stops_at_the_previous_anchor() {
        let doc = Document::from_html("<ul><li>a</li><li>b</li><li>c</li></ul>");
        let ul = doc.first_child(doc.body()).expect("ul");
        let lis = doc.children(ul);
        let span = ElementSpan { element: ul };

        assert_eq!(span.remove_span(&doc, Some(lis[0]), lis[1]), 1);
        assert_eq!(doc.inner_html(ul), "<li>a</li><li>c</li>");

        assert_eq!(span.remove_span(&doc, None, lis[2]), 2);
        assert!(doc.children(ul).is_empty());
    }

    #[test]
    fn remove_span_in_virtual_range_keeps_the_opening_comment() {
        let doc = Document::from_html("<!-- ko --><b>1</b><b>2</b><!-- /ko -->");
        let start = doc.first_child(doc.body()).expect("start");
        let span = span_for(&doc, start).expect("span");
        let last = span.last_node(&doc).expect("last");

        span.remove_span(&doc, None, last);

        assert_eq!(doc.inner_html(doc.body()), "<!-- ko --><!-- /ko -->");
    }
}
