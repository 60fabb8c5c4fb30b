//! Binding Provider
//!
//! Wires a binding context to a subtree. `BindingProvider` is the seam the
//! list synchronizer binds items through; `DeclarativeBinder` is the stock
//! implementation, driven by `data-bind` attributes.
//!
//! # Supported bindings
//!
//! - `text: expr` sets the element's text. `text: $index` stays live and
//!   follows the item's index cell until the node is removed.
//! - `value: expr` sets the `value` attribute.
//! - `attr: { name: expr, ... }` sets attributes.
//! - `init` reads the value already present in the markup and hands it to
//!   the context's field writers instead of overwriting the markup:
//!   - `init` or `init: true` writes to the field named by the `text` or
//!     `value` binding on the same element (or each field of `attr`)
//!   - `init: field` or `init: { field: name }` writes to `field`
//!   - `init: { field: name, value: literal }` writes the literal
//!   - `init: { a: literal, b: literal }` writes each literal to its field

use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use super::context::BindingContext;
use crate::dom::{Document, NodeId};
use crate::reactive::SubscriberId;

/// Applies bindings to nodes.
pub trait BindingProvider: Send + Sync {
    /// Apply the bindings declared on `node` itself.
    fn bind_node(&self, ctx: &Arc<BindingContext>, doc: &Document, node: NodeId);

    /// Bind `node` and then its descendants.
    fn apply_bindings(&self, ctx: &Arc<BindingContext>, doc: &Document, node: NodeId) {
        self.bind_node(ctx, doc, node);
        self.apply_bindings_to_descendants(ctx, doc, node);
    }

    /// Bind every descendant of `node`, but not `node`.
    fn apply_bindings_to_descendants(
        &self,
        ctx: &Arc<BindingContext>,
        doc: &Document,
        node: NodeId,
    ) {
        for child in doc.children(node) {
            self.apply_bindings(ctx, doc, child);
        }
    }
}

/// Attribute read by `DeclarativeBinder` unless configured otherwise.
pub const BINDING_ATTRIBUTE: &str = "data-bind";

/// Binds elements according to their `data-bind` attribute.
#[derive(Debug, Clone)]
pub struct DeclarativeBinder {
    attribute: String,
}

impl DeclarativeBinder {
    pub fn new() -> Self {
        Self {
            attribute: BINDING_ATTRIBUTE.to_string(),
        }
    }

    /// Read bindings from a different attribute.
    pub fn with_attribute(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
        }
    }

    fn bind_text(
        &self,
        ctx: &Arc<BindingContext>,
        doc: &Document,
        node: NodeId,
        expression: &str,
        init: Option<&InitSpec>,
    ) {
        if let Some(init) = init {
            let markup = doc.text_content(node);
            write_single_value(ctx, init, expression, Value::String(markup));
            return;
        }

        if expression.trim() == "$index" {
            if let Some(cell) = ctx.index_cell() {
                doc.set_text_content(node, &cell.get_untracked().to_string());
                let subscriber = SubscriberId::new();
                let writer = doc.clone();
                cell.subscribe(subscriber, move |index| {
                    writer.set_text_content(node, &index.to_string());
                });
                let cell = cell.clone();
                doc.add_dispose_callback(node, move || cell.unsubscribe(subscriber));
                return;
            }
        }

        match ctx.resolve(expression) {
            Some(value) => doc.set_text_content(node, &display(&value)),
            None => trace!(expression, "text binding did not resolve"),
        }
    }

    fn bind_value(
        &self,
        ctx: &Arc<BindingContext>,
        doc: &Document,
        node: NodeId,
        expression: &str,
        init: Option<&InitSpec>,
    ) {
        if let Some(init) = init {
            let markup = doc.attribute(node, "value").unwrap_or_default();
            write_single_value(ctx, init, expression, Value::String(markup));
            return;
        }
        if let Some(value) = ctx.resolve(expression) {
            doc.set_attribute(node, "value", &display(&value));
        }
    }

    fn bind_attr(
        &self,
        ctx: &Arc<BindingContext>,
        doc: &Document,
        node: NodeId,
        expression: &str,
        init: Option<&InitSpec>,
    ) {
        let Some(pairs) = parse_object_literal(expression) else {
            trace!(expression, "attr binding expects an object literal");
            return;
        };
        for (name, field) in pairs {
            if init.is_some() {
                if let Some(markup) = doc.attribute(node, &name) {
                    write_field(ctx, &field_name(&field), Value::String(markup));
                }
            } else if let Some(value) = ctx.resolve(&field) {
                doc.set_attribute(node, &name, &display(&value));
            }
        }
    }
}

impl Default for DeclarativeBinder {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingProvider for DeclarativeBinder {
    fn bind_node(&self, ctx: &Arc<BindingContext>, doc: &Document, node: NodeId) {
        let Some(declaration) = doc.attribute(node, &self.attribute) else {
            return;
        };
        let bindings = parse_bindings(&declaration);
        let init = bindings
            .iter()
            .find(|(name, _)| name == "init")
            .map(|(_, expression)| InitSpec::parse(ctx, expression.as_deref()));

        let mut has_single_value = false;
        for (name, expression) in &bindings {
            let expression = expression.as_deref().unwrap_or("true");
            match name.as_str() {
                "text" => {
                    has_single_value = true;
                    self.bind_text(ctx, doc, node, expression, init.as_ref());
                }
                "value" => {
                    has_single_value = true;
                    self.bind_value(ctx, doc, node, expression, init.as_ref());
                }
                "attr" => self.bind_attr(ctx, doc, node, expression, init.as_ref()),
                "init" => {}
                other => trace!(binding = other, "unsupported binding ignored"),
            }
        }

        if let Some(init) = &init {
            apply_standalone_init(ctx, doc, node, init, has_single_value);
        }
    }
}

/// Parsed form of an `init` binding.
#[derive(Debug, Clone, PartialEq)]
enum InitSpec {
    /// Write to the field of the binding it accompanies.
    Bare,
    /// Write the markup value to this field.
    Field(String),
    /// Write a fixed value to a field.
    Explicit { field: String, value: Value },
    /// Write each value to the field of the same name.
    Values(Vec<(String, Value)>),
}

impl InitSpec {
    fn parse(ctx: &BindingContext, expression: Option<&str>) -> Self {
        let Some(expression) = expression.map(str::trim) else {
            return InitSpec::Bare;
        };
        if expression == "true" {
            return InitSpec::Bare;
        }
        let Some(pairs) = parse_object_literal(expression) else {
            return InitSpec::Field(field_name(expression));
        };

        let field = pairs
            .iter()
            .find(|(key, _)| key == "field")
            .map(|(_, v)| field_name(v));
        let value = pairs
            .iter()
            .find(|(key, _)| key == "value")
            .and_then(|(_, v)| ctx.resolve(v));
        match (field, value) {
            (Some(field), Some(value)) => InitSpec::Explicit { field, value },
            (Some(field), None) => InitSpec::Field(field),
            (None, _) => InitSpec::Values(
                pairs
                    .into_iter()
                    .filter(|(key, _)| key != "value" && key != "convert")
                    .filter_map(|(key, v)| ctx.resolve(&v).map(|value| (key, value)))
                    .collect(),
            ),
        }
    }
}

/// A `text` or `value` binding with `init`: route the markup value either to
/// the init field or to the binding's own field.
fn write_single_value(ctx: &BindingContext, init: &InitSpec, expression: &str, markup: Value) {
    match init {
        InitSpec::Field(field) => write_field(ctx, field, markup),
        InitSpec::Bare | InitSpec::Explicit { .. } | InitSpec::Values(_) => {
            write_field(ctx, &field_name(expression), markup);
        }
    }
}

fn apply_standalone_init(
    ctx: &BindingContext,
    doc: &Document,
    node: NodeId,
    init: &InitSpec,
    has_single_value: bool,
) {
    match init {
        InitSpec::Bare => {}
        InitSpec::Field(field) => {
            if !has_single_value {
                write_field(ctx, field, Value::String(read_markup(doc, node)));
            }
        }
        InitSpec::Explicit { field, value } => write_field(ctx, field, value.clone()),
        InitSpec::Values(values) => {
            for (field, value) in values {
                write_field(ctx, field, value.clone());
            }
        }
    }
}

fn write_field(ctx: &BindingContext, field: &str, value: Value) {
    match ctx.writer(field) {
        Some(writer) => writer(ctx, value),
        None => trace!(field, "no writer for field"),
    }
}

/// The element's text, or its `value` attribute when it has no text.
fn read_markup(doc: &Document, node: NodeId) -> String {
    let text = doc.text_content(node);
    if text.is_empty() {
        doc.attribute(node, "value").unwrap_or_default()
    } else {
        text
    }
}

/// Writer key for an expression: `$data.name` and `name` both map to `name`.
fn field_name(expression: &str) -> String {
    let expression = expression.trim();
    expression
        .strip_prefix("$data.")
        .unwrap_or(expression)
        .to_string()
}

/// Text shown for a value: strings unquoted, null empty.
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Split on `separator` outside of quotes and brackets.
fn split_top_level(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '{' | '[' | '(') => depth += 1,
            (None, '}' | ']' | ')') => depth -= 1,
            (None, c) if c == separator && depth == 0 => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn unquote(key: &str) -> &str {
    let key = key.trim();
    key.strip_prefix(['\'', '"'])
        .and_then(|k| k.strip_suffix(['\'', '"']))
        .unwrap_or(key)
}

/// `text: name, init` becomes `[("text", Some("name")), ("init", None)]`.
fn parse_bindings(declaration: &str) -> Vec<(String, Option<String>)> {
    split_top_level(declaration, ',')
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            let mut halves = split_top_level(part, ':').into_iter();
            let name = unquote(halves.next().unwrap_or_default()).to_string();
            let rest: Vec<&str> = halves.collect();
            let expression = (!rest.is_empty()).then(|| rest.join(":").trim().to_string());
            (name, expression)
        })
        .collect()
}

/// `{ href: url, 'title': name }` into key/expression pairs.
fn parse_object_literal(expression: &str) -> Option<Vec<(String, String)>> {
    let inner = expression
        .trim()
        .strip_prefix('{')?
        .strip_suffix('}')?;
    Some(
        parse_bindings(inner)
            .into_iter()
            .map(|(key, value)| {
                let value = value.unwrap_or_else(|| key.clone());
                (key, value)
            })
            .collect(),
    )
}
