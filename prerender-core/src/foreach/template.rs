//! Template Store
//!
//! Locates the item template, copies it into a detached container, and
//! finds the pre-rendered item nodes the list starts out bound to.
//!
//! Two sources are recognized:
//!
//! - inline: the first child of the bound span marked `data-template`, plus
//!   the element siblings that follow it up to `nodes_per_element`. The
//!   originals are removed so they are not taken for live items.
//! - named: the element with the given id. A `<template>` contributes its
//!   content, a `<script>` its text parsed as markup, anything else its
//!   children. No marker is needed and the source is left in place.

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::dom::{Document, FragmentContext, NodeId, NodeSpan};
use crate::error::{HydrateError, Result};

/// Marks the inline template node(s).
pub const TEMPLATE_ATTRIBUTE: &str = "data-template";

/// Marks each pre-rendered item node when the template is inline.
pub const LIVE_ITEM_ATTRIBUTE: &str = "data-init";

/// A detached copy of the item template.
///
/// Never modified after extraction; every render deep-clones it.
#[derive(Debug, Clone)]
pub struct TemplateFragment {
    document: Document,
    container: NodeId,
    named: bool,
}

impl TemplateFragment {
    /// Extract the template for a binding rendering into `host`.
    pub fn extract(
        doc: &Document,
        host: &dyn NodeSpan,
        name: Option<&str>,
        nodes_per_element: usize,
    ) -> Result<Self> {
        let (candidates, marker) = match name {
            Some(name) => (named_source_nodes(doc, name)?, None),
            None => (host.child_nodes(doc), Some(TEMPLATE_ATTRIBUTE)),
        };

        let start = candidates
            .iter()
            .position(|node| match marker {
                Some(attribute) => doc.is_element(*node) && doc.has_attribute(*node, attribute),
                None => doc.is_element(*node),
            })
            .ok_or(HydrateError::TemplateNotFound {
                attribute: marker.unwrap_or("*"),
            })?;

        let originals: SmallVec<[NodeId; 4]> = candidates[start..]
            .iter()
            .copied()
            .filter(|node| doc.is_element(*node))
            .take(nodes_per_element)
            .collect();
        if originals.len() < nodes_per_element {
            warn!(
                found = originals.len(),
                expected = nodes_per_element,
                "template has fewer element nodes than nodes per element"
            );
        }

        let container = doc.create_element("div");
        for original in &originals {
            let copy = doc.clone_node(*original, true);
            doc.append_child(container, copy);
            if name.is_none() {
                doc.remove_node(*original);
            }
        }
        debug!(nodes = originals.len(), named = name.is_some(), "extracted item template");

        Ok(Self {
            document: doc.clone(),
            container,
            named: name.is_some(),
        })
    }

    /// Build a template directly from markup. Every top-level node becomes
    /// part of one item.
    pub fn from_markup(doc: &Document, markup: &str) -> Self {
        let container = doc.create_element("div");
        for node in doc.parse_fragment_in(markup, FragmentContext::sniff(markup)) {
            doc.append_child(container, node);
        }
        Self {
            document: doc.clone(),
            container,
            named: false,
        }
    }

    /// A fresh deep copy of the container. Its children are one item's nodes.
    ///
    /// The copy is detached; remove it once its children have been moved
    /// out, or its slot is never reused.
    pub fn instantiate(&self) -> NodeId {
        self.document.clone_node(self.container, true)
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    /// Nodes one render produces.
    pub fn node_count(&self) -> usize {
        self.document.children(self.container).len()
    }

    /// Whether the template came from a named element.
    pub fn is_named(&self) -> bool {
        self.named
    }
}

/// Top-level nodes of the named template source.
fn named_source_nodes(doc: &Document, name: &str) -> Result<Vec<NodeId>> {
    let source = doc
        .get_element_by_id(name)
        .ok_or_else(|| HydrateError::NamedTemplateMissing(name.to_string()))?;

    Ok(match doc.tag_name(source).as_deref() {
        Some("script") => {
            let markup = doc.text_content(source);
            doc.parse_fragment_in(&markup, FragmentContext::sniff(&markup))
        }
        _ => doc.children(source),
    })
}

/// The pre-rendered item nodes inside `host`, in document order.
///
/// With an inline template only elements marked `data-init` count; with a
/// named template every element child does.
pub fn find_live_nodes(doc: &Document, host: &dyn NodeSpan, named: bool) -> Vec<NodeId> {
    host.child_nodes(doc)
        .into_iter()
        .filter(|node| {
            doc.is_element(*node) && (named || doc.has_attribute(*node, LIVE_ITEM_ATTRIBUTE))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{span_for, ElementSpan};
    use pretty_assertions::assert_eq;

    fn host(doc: &Document) -> ElementSpan {
        ElementSpan {
            element: doc.get_element_by_id("list").expect("list element"),
        }
    }

    #[test]
    fn inline_template_is_copied_and_removed() {
        let doc = Document::from_html(
            "<ul id=\"list\"><li data-init>a</li><li data-template>t</li></ul>",
        );
        let span = host(&doc);

        let template = TemplateFragment::extract(&doc, &span, None, 1).expect("template");

        assert_eq!(doc.inner_html(span.element), "<li data-init=\"\">a</li>");
        assert_eq!(
            doc.inner_html(template.container()),
            "<li data-template=\"\">t</li>"
        );
        assert!(!template.is_named());
    }

    #[test]
    fn instantiate_returns_independent_copies() {
        let doc = Document::from_html("<ul id=\"list\"><li data-template>t</li></ul>");
        let template = TemplateFragment::extract(&doc, &host(&doc), None, 1).expect("template");

        let first = template.instantiate();
        let second = template.instantiate();

        assert_ne!(first, second);
        assert_ne!(doc.children(first), doc.children(second));
        assert_eq!(template.node_count(), 1);
    }

    #[test]
    fn multi_node_template_takes_following_elements() {
        let doc = Document::from_html(
            "<dl id=\"list\"><dt data-template>k</dt> <dd>v</dd><dt>other</dt></dl>",
        );
        let span = host(&doc);

        let template = TemplateFragment::extract(&doc, &span, None, 2).expect("template");

        assert_eq!(doc.inner_html(template.container()), "<dt data-template=\"\">k</dt><dd>v</dd>");
        assert_eq!(doc.inner_html(span.element), " <dt>other</dt>");
    }

    #[test]
    fn missing_inline_template_is_an_error() {
        let doc = Document::from_html("<ul id=\"list\"><li data-init>a</li></ul>");
        let err = TemplateFragment::extract(&doc, &host(&doc), None, 1).unwrap_err();
        assert!(matches!(err, HydrateError::TemplateNotFound { attribute: "data-template" }));
    }

    #[test]
    fn named_template_element_content() {
        let doc = Document::from_html(
            "<template id=\"row\"><li>t</li></template><ul id=\"list\"><li>a</li></ul>",
        );
        let span = host(&doc);

        let template = TemplateFragment::extract(&doc, &span, Some("row"), 1).expect("template");

        assert!(template.is_named());
        assert_eq!(doc.inner_html(template.container()), "<li>t</li>");
        let source = doc.get_element_by_id("row").expect("source kept");
        assert_eq!(doc.inner_html(source), "<li>t</li>");
    }

    #[test]
    fn named_script_with_table_rows() {
        let doc = Document::from_html(
            "<script id=\"row\" type=\"text/html\"><tr><td>t</td></tr></script><table><tbody id=\"list\"></tbody></table>",
        );

        let template = TemplateFragment::extract(&doc, &host(&doc), Some("row"), 1).expect("template");

        assert_eq!(doc.inner_html(template.container()), "<tr><td>t</td></tr>");
    }

    #[test]
    fn named_div_uses_its_children() {
        let doc = Document::from_html("<div id=\"row\"> <p>t</p></div><div id=\"list\"></div>");

        let template = TemplateFragment::extract(&doc, &host(&doc), Some("row"), 1).expect("template");

        assert_eq!(doc.inner_html(template.container()), "<p>t</p>");
    }

    #[test]
    fn missing_named_template_is_an_error() {
        let doc = Document::from_html("<ul id=\"list\"></ul>");
        let err = TemplateFragment::extract(&doc, &host(&doc), Some("nope"), 1).unwrap_err();
        assert!(matches!(err, HydrateError::NamedTemplateMissing(name) if name == "nope"));
    }

    #[test]
    fn live_nodes_follow_the_template_mode() {
        let doc = Document::from_html(
            "<ul id=\"list\"><li data-init>a</li><li>b</li><!-- c --></ul>",
        );
        let span = host(&doc);

        assert_eq!(find_live_nodes(&doc, &span, false).len(), 1);
        assert_eq!(find_live_nodes(&doc, &span, true).len(), 2);
    }

    #[test]
    fn virtual_span_template_and_live_nodes() {
        let doc = Document::from_html(
            "<li>outside</li><!-- ko --><li data-init>a</li><li data-template>t</li><!-- /ko -->",
        );
        let start = doc.children(doc.body())[1];
        let span = span_for(&doc, start).expect("span");

        let template = TemplateFragment::extract(&doc, span.as_ref(), None, 1).expect("template");
        let live = find_live_nodes(&doc, span.as_ref(), false);

        assert_eq!(template.node_count(), 1);
        assert_eq!(live.len(), 1);
        assert_eq!(
            doc.inner_html(doc.body()),
            "<li>outside</li><!-- ko --><li data-init=\"\">a</li><!-- /ko -->"
        );
    }
}
