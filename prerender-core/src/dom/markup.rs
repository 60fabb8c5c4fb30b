//! Markup Import
//!
//! Parses HTML fragments with html5ever into an `RcDom`, then copies the
//! result into the document arena. Serialization lives on `Document`.

use html5ever::tendril::TendrilSink;
use html5ever::{local_name, namespace_url, ns, parse_fragment, ParseOpts, QualName};
use indexmap::IndexMap;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};
use tracing::trace;

use super::document::Document;
use super::node::{NodeId, NodeKind};

/// The element a fragment is parsed as if it were inside.
///
/// Table rows only survive parsing inside a table section; parsed in body
/// context the `<tr>` tags would be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FragmentContext {
    #[default]
    Body,
    TableBody,
}

impl FragmentContext {
    fn qual_name(self) -> QualName {
        match self {
            FragmentContext::Body => QualName::new(None, ns!(html), local_name!("body")),
            FragmentContext::TableBody => QualName::new(None, ns!(html), local_name!("tbody")),
        }
    }

    /// Pick the context for a template source: markup made only of table
    /// rows is parsed as a table body.
    pub fn sniff(markup: &str) -> Self {
        let markup = markup.trim().to_ascii_lowercase();
        if markup.starts_with("<tr") && markup.ends_with("</tr>") {
            FragmentContext::TableBody
        } else {
            FragmentContext::Body
        }
    }
}

impl Document {
    /// Parse markup into detached top-level nodes, in body context.
    pub fn parse_fragment(&self, markup: &str) -> Vec<NodeId> {
        self.parse_fragment_in(markup, FragmentContext::Body)
    }

    /// Parse markup into detached top-level nodes.
    pub fn parse_fragment_in(&self, markup: &str, context: FragmentContext) -> Vec<NodeId> {
        let dom = parse_fragment(RcDom::default(), ParseOpts::default(), context.qual_name(), vec![])
            .one(markup);

        // Fragment parsing wraps the result in a synthetic <html> element.
        let root = dom.document.children.borrow().first().cloned();
        let Some(root) = root else {
            return Vec::new();
        };
        let top: Vec<Handle> = root.children.borrow().clone();
        let nodes: Vec<NodeId> = top.iter().filter_map(|h| self.import(h)).collect();
        trace!(count = nodes.len(), ?context, "parsed fragment");
        nodes
    }

    /// Replace a node's children with parsed markup.
    pub fn set_inner_html(&self, node: NodeId, markup: &str) {
        for child in self.children(node) {
            self.remove_node(child);
        }
        let context = match self.tag_name(node).as_deref() {
            Some("tbody" | "thead" | "tfoot" | "table") => FragmentContext::TableBody,
            _ => FragmentContext::Body,
        };
        for child in self.parse_fragment_in(markup, context) {
            self.append_child(node, child);
        }
    }

    /// Build a document whose body holds the given markup.
    pub fn from_html(markup: &str) -> Self {
        let doc = Document::new();
        doc.set_inner_html(doc.body(), markup);
        doc
    }

    fn import(&self, handle: &Handle) -> Option<NodeId> {
        let id = match &handle.data {
            RcNodeData::Text { contents } => {
                return Some(self.create_text(&contents.borrow()));
            }
            RcNodeData::Comment { contents } => {
                return Some(self.create_comment(contents));
            }
            RcNodeData::Element {
                name,
                attrs,
                template_contents,
                ..
            } => {
                let attributes: IndexMap<String, String> = attrs
                    .borrow()
                    .iter()
                    .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                    .collect();
                let id = self.create_node(NodeKind::Element {
                    tag: name.local.to_string(),
                    attributes,
                });
                // <template> content is parsed into a separate fragment.
                if let Some(contents) = template_contents.borrow().as_ref() {
                    self.import_children(id, contents);
                }
                id
            }
            RcNodeData::Document
            | RcNodeData::Doctype { .. }
            | RcNodeData::ProcessingInstruction { .. } => return None,
        };
        self.import_children(id, handle);
        Some(id)
    }

    fn import_children(&self, parent: NodeId, handle: &Handle) {
        let children: Vec<Handle> = handle.children.borrow().clone();
        for child in &children {
            if let Some(node) = self.import(child) {
                self.append_child(parent, node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_elements_text_and_comments() {
        let doc = Document::new();
        let nodes = doc.parse_fragment("<!-- ko --><li data-init>Ann</li>");

        assert_eq!(nodes.len(), 2);
        assert_eq!(doc.comment_text(nodes[0]).as_deref(), Some(" ko "));
        assert_eq!(doc.tag_name(nodes[1]).as_deref(), Some("li"));
        assert_eq!(doc.attribute(nodes[1], "data-init").as_deref(), Some(""));
        assert_eq!(doc.text_content(nodes[1]), "Ann");
    }

    #[test]
    fn template_content_becomes_children() {
        let doc = Document::from_html("<template id=\"row\"><li>x</li></template>");
        let template = doc.get_element_by_id("row").expect("template element");

        assert_eq!(doc.inner_html(template), "<li>x</li>");
    }

    #[test]
    fn table_rows_need_table_context() {
        let doc = Document::new();
        let markup = "<tr><td>1</td></tr>";

        let in_body = doc.parse_fragment(markup);
        assert!(in_body.iter().all(|n| doc.tag_name(*n).as_deref() != Some("tr")));

        let context = FragmentContext::sniff(markup);
        assert_eq!(context, FragmentContext::TableBody);
        let rows = doc.parse_fragment_in(markup, context);
        assert_eq!(doc.tag_name(rows[0]).as_deref(), Some("tr"));
    }

    #[test]
    fn round_trips_through_the_serializer() {
        let markup = "<ul><li data-init=\"\">Ann</li><li data-template=\"\"></li></ul>";
        let doc = Document::from_html(markup);
        assert_eq!(doc.inner_html(doc.body()), markup);
    }
}
