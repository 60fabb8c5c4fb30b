//! Binding Contexts
//!
//! The scope a node is bound against: the item value (`$data`), an optional
//! alias for it, the item's `$index` cell, the parent chain, and the field
//! writers that `init` bindings push markup values into.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::reactive::Signal;

/// Setter for one model field. Receives the scope of the node being bound,
/// so one writer can serve every item of a list.
pub type FieldWriter = Arc<dyn Fn(&BindingContext, Value) + Send + Sync>;

/// Field name to setter table.
///
/// Built once while configuring a binding and shared by every context
/// derived from the root it is attached to.
#[derive(Clone, Default)]
pub struct FieldWriters {
    writers: IndexMap<String, FieldWriter>,
}

impl FieldWriters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a setter for `field`, builder style.
    pub fn with<F>(mut self, field: impl Into<String>, writer: F) -> Self
    where
        F: Fn(&BindingContext, Value) + Send + Sync + 'static,
    {
        self.insert(field, writer);
        self
    }

    pub fn insert<F>(&mut self, field: impl Into<String>, writer: F)
    where
        F: Fn(&BindingContext, Value) + Send + Sync + 'static,
    {
        self.writers.insert(field.into(), Arc::new(writer));
    }

    pub fn get(&self, field: &str) -> Option<FieldWriter> {
        self.writers.get(field).cloned()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.writers.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.writers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

impl fmt::Debug for FieldWriters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.writers.keys()).finish()
    }
}

/// A node's binding scope.
///
/// Contexts are immutable once built, apart from the `$index` cell, and are
/// shared behind `Arc`.
pub struct BindingContext {
    data: Value,
    alias: Option<String>,
    index: Option<Signal<usize>>,
    parent: Option<Arc<BindingContext>>,
    extras: IndexMap<String, Value>,
    writers: Arc<FieldWriters>,
}

impl BindingContext {
    /// A root context with no writers.
    pub fn root(data: Value) -> Arc<Self> {
        Self::with_writers(data, FieldWriters::new())
    }

    /// A root context whose `init` bindings write through `writers`.
    pub fn with_writers(data: Value, writers: FieldWriters) -> Arc<Self> {
        Arc::new(Self {
            data,
            alias: None,
            index: None,
            parent: None,
            extras: IndexMap::new(),
            writers: Arc::new(writers),
        })
    }

    /// Derive the context for a child scope, such as one list item.
    pub fn child(
        self: &Arc<Self>,
        data: Value,
        alias: Option<&str>,
        index: Option<Signal<usize>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            data,
            alias: alias.map(str::to_string),
            index,
            parent: Some(Arc::clone(self)),
            extras: IndexMap::new(),
            writers: Arc::clone(&self.writers),
        })
    }

    /// Copy this context with one more named value. `$data` and the parent
    /// chain are unchanged.
    pub fn extend(self: &Arc<Self>, name: &str, value: Value) -> Arc<Self> {
        let mut extras = self.extras.clone();
        extras.insert(name.to_string(), value);
        Arc::new(Self {
            data: self.data.clone(),
            alias: self.alias.clone(),
            index: self.index.clone(),
            parent: self.parent.clone(),
            extras,
            writers: Arc::clone(&self.writers),
        })
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn parent(&self) -> Option<&Arc<BindingContext>> {
        self.parent.as_ref()
    }

    /// The nearest `$index` cell in the chain.
    pub fn index_cell(&self) -> Option<&Signal<usize>> {
        match &self.index {
            Some(cell) => Some(cell),
            None => self.parent.as_ref().and_then(|p| p.index_cell()),
        }
    }

    /// Current value of `$index`, if this scope has one.
    pub fn index(&self) -> Option<usize> {
        self.index_cell().map(Signal::get_untracked)
    }

    pub fn extra(&self, name: &str) -> Option<&Value> {
        self.extras.get(name)
    }

    fn root_data(&self) -> &Value {
        match &self.parent {
            Some(parent) => parent.root_data(),
            None => &self.data,
        }
    }

    /// Find the setter for `field`.
    pub fn writer(&self, field: &str) -> Option<FieldWriter> {
        self.writers.get(field)
    }

    /// Evaluate a simple expression: a literal, a name, or a dotted path.
    pub fn resolve(&self, expression: &str) -> Option<Value> {
        let expression = expression.trim();
        if let Some(literal) = parse_literal(expression) {
            return Some(literal);
        }

        let mut segments = expression.split('.').map(str::trim);
        let head = segments.next()?;
        let mut value = self.lookup(head)?;
        for segment in segments {
            value = match value {
                Value::Object(mut map) => map.remove(segment)?,
                Value::Array(mut items) => {
                    let index: usize = segment.parse().ok()?;
                    (index < items.len()).then(|| items.swap_remove(index))?
                }
                _ => return None,
            };
        }
        Some(value)
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        match name {
            "$data" => return Some(self.data.clone()),
            "$index" => return self.index().map(Value::from),
            "$parent" => return self.parent.as_ref().map(|p| p.data.clone()),
            "$root" => return Some(self.root_data().clone()),
            _ => {}
        }
        if let Some(field) = self.data.as_object().and_then(|map| map.get(name)) {
            return Some(field.clone());
        }
        self.lookup_named(name)
    }

    /// Aliases and extras are visible to nested scopes.
    fn lookup_named(&self, name: &str) -> Option<Value> {
        if self.alias.as_deref() == Some(name) {
            return Some(self.data.clone());
        }
        if let Some(value) = self.extras.get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup_named(name))
    }
}

impl fmt::Debug for BindingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingContext")
            .field("data", &self.data)
            .field("alias", &self.alias)
            .field("index", &self.index())
            .field("extras", &self.extras)
            .finish()
    }
}

/// JSON literals plus single-quoted strings.
pub(crate) fn parse_literal(expression: &str) -> Option<Value> {
    if let Some(inner) = expression
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return Some(Value::String(inner.to_string()));
    }
    let first = expression.chars().next()?;
    let is_literal = first == '"'
        || first == '-'
        || first.is_ascii_digit()
        || matches!(expression, "true" | "false" | "null");
    if is_literal {
        return serde_json::from_str(expression).ok();
    }
    None
}
