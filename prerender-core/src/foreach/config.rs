//! List Binding Configuration
//!
//! What a list binding is bound to and how it renders. The shape of the
//! configuration is decided once, when the caller builds a `ForeachSource`:
//! either a bare collection or a full `ForeachOptions`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::classify::{ChangeMap, QueuedChange};
use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::reactive::{ComputedList, ObservableArray, Signal};

/// Attribute holding JSON `ForeachSettings` on the bound element.
pub const SETTINGS_ATTRIBUTE: &str = "data-foreach";

/// Called with the whole batch before and after it is applied.
pub type FlushHook = Arc<dyn Fn(&[QueuedChange]) + Send + Sync>;

/// Called with each classified change set before it is queued.
pub type DataChangedHook = Arc<dyn Fn(&ChangeMap) + Send + Sync>;

/// Produces one collection item per pre-rendered item span.
pub type ElementFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// The list a binding follows.
#[derive(Debug, Clone)]
pub enum Collection {
    /// A fixed list. Rendered once, never updated.
    Static(Vec<Value>),
    /// A list that publishes its own diffs.
    Array(ObservableArray),
    /// A cell holding a whole list. Diffs are computed against the previous
    /// contents on every write.
    Signal(Signal<Vec<Value>>),
    /// A derived list; publishes diffs when its inputs change.
    Computed(ComputedList),
}

impl Collection {
    /// Current contents.
    pub fn snapshot(&self) -> Vec<Value> {
        match self {
            Collection::Static(items) => items.clone(),
            Collection::Array(array) => array.snapshot(),
            Collection::Signal(signal) => signal.get_untracked(),
            Collection::Computed(list) => list.snapshot(),
        }
    }

    /// Store items created for pre-rendered markup.
    ///
    /// Observable collections are replaced; a static list is appended to.
    pub(crate) fn fill(&mut self, items: Vec<Value>) {
        match self {
            Collection::Static(current) => current.extend(items),
            Collection::Array(array) => array.replace(items),
            Collection::Signal(signal) => signal.set(items),
            Collection::Computed(_) => {
                warn!("createElement ignored: a computed list cannot be written to");
            }
        }
    }
}

impl From<Vec<Value>> for Collection {
    fn from(items: Vec<Value>) -> Self {
        Collection::Static(items)
    }
}

impl From<ObservableArray> for Collection {
    fn from(array: ObservableArray) -> Self {
        Collection::Array(array)
    }
}

impl From<Signal<Vec<Value>>> for Collection {
    fn from(signal: Signal<Vec<Value>>) -> Self {
        Collection::Signal(signal)
    }
}

impl From<ComputedList> for Collection {
    fn from(list: ComputedList) -> Self {
        Collection::Computed(list)
    }
}

/// Serializable subset of the options.
///
/// Read from JSON, for instance the `data-foreach` attribute:
///
/// ```json
/// { "name": "row-template", "as": "person", "nodesPerElement": 2 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ForeachSettings {
    pub name: Option<String>,
    #[serde(rename = "as")]
    pub alias: Option<String>,
    pub no_context: bool,
    pub nodes_per_element: Option<usize>,
}

impl ForeachSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Settings declared on `node`, if it carries the settings attribute.
    pub fn from_element(doc: &Document, node: NodeId) -> Result<Option<Self>> {
        doc.attribute(node, SETTINGS_ATTRIBUTE)
            .map(|json| Self::from_json(&json))
            .transpose()
    }
}

/// Full configuration of a list binding.
#[derive(Clone)]
pub struct ForeachOptions {
    pub data: Collection,
    /// Id of an element holding the item template.
    pub name: Option<String>,
    /// Name the item is reachable by, besides `$data`.
    pub alias: Option<String>,
    /// Bind items in an extension of the parent scope (`$item`) instead of
    /// a child scope with its own `$data` and `$index`.
    pub no_context: bool,
    pub create_element: Option<ElementFactory>,
    /// DOM nodes per item. `None` and `Some(0)` both mean one.
    pub nodes_per_element: Option<usize>,
    pub before_queue_flush: Option<FlushHook>,
    pub after_queue_flush: Option<FlushHook>,
    pub data_changed: Option<DataChangedHook>,
}

impl ForeachOptions {
    pub fn new(data: impl Into<Collection>) -> Self {
        Self {
            data: data.into(),
            name: None,
            alias: None,
            no_context: false,
            create_element: None,
            nodes_per_element: None,
            before_queue_flush: None,
            after_queue_flush: None,
            data_changed: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn no_context(mut self, no_context: bool) -> Self {
        self.no_context = no_context;
        self
    }

    pub fn create_element<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.create_element = Some(Arc::new(factory));
        self
    }

    pub fn nodes_per_element(mut self, count: usize) -> Self {
        self.nodes_per_element = Some(count);
        self
    }

    pub fn before_queue_flush<F>(mut self, hook: F) -> Self
    where
        F: Fn(&[QueuedChange]) + Send + Sync + 'static,
    {
        self.before_queue_flush = Some(Arc::new(hook));
        self
    }

    pub fn after_queue_flush<F>(mut self, hook: F) -> Self
    where
        F: Fn(&[QueuedChange]) + Send + Sync + 'static,
    {
        self.after_queue_flush = Some(Arc::new(hook));
        self
    }

    pub fn data_changed<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ChangeMap) + Send + Sync + 'static,
    {
        self.data_changed = Some(Arc::new(hook));
        self
    }

    /// Fill in options left unset from `settings`.
    pub fn merge_settings(mut self, settings: ForeachSettings) -> Self {
        self.name = self.name.or(settings.name);
        self.alias = self.alias.or(settings.alias);
        self.no_context |= settings.no_context;
        self.nodes_per_element = self.nodes_per_element.or(settings.nodes_per_element);
        self
    }

    /// Effective nodes per item, never zero.
    pub fn item_node_count(&self) -> usize {
        self.nodes_per_element.unwrap_or(1).max(1)
    }
}

impl fmt::Debug for ForeachOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeachOptions")
            .field("data", &self.data)
            .field("name", &self.name)
            .field("alias", &self.alias)
            .field("no_context", &self.no_context)
            .field("create_element", &self.create_element.is_some())
            .field("nodes_per_element", &self.nodes_per_element)
            .field("before_queue_flush", &self.before_queue_flush.is_some())
            .field("after_queue_flush", &self.after_queue_flush.is_some())
            .field("data_changed", &self.data_changed.is_some())
            .finish()
    }
}

/// What a list binding was given: a bare collection or full options.
#[derive(Debug, Clone)]
pub enum ForeachSource {
    RawCollection(Collection),
    Options(ForeachOptions),
}

impl ForeachSource {
    pub fn into_options(self) -> ForeachOptions {
        match self {
            ForeachSource::RawCollection(data) => ForeachOptions::new(data),
            ForeachSource::Options(options) => options,
        }
    }
}

impl From<ForeachOptions> for ForeachSource {
    fn from(options: ForeachOptions) -> Self {
        ForeachSource::Options(options)
    }
}

impl From<Collection> for ForeachSource {
    fn from(data: Collection) -> Self {
        ForeachSource::RawCollection(data)
    }
}

impl From<Vec<Value>> for ForeachSource {
    fn from(items: Vec<Value>) -> Self {
        ForeachSource::RawCollection(items.into())
    }
}

impl From<ObservableArray> for ForeachSource {
    fn from(array: ObservableArray) -> Self {
        ForeachSource::RawCollection(array.into())
    }
}

impl From<Signal<Vec<Value>>> for ForeachSource {
    fn from(signal: Signal<Vec<Value>>) -> Self {
        ForeachSource::RawCollection(signal.into())
    }
}

impl From<ComputedList> for ForeachSource {
    fn from(list: ComputedList) -> Self {
        ForeachSource::RawCollection(list.into())
    }
}
