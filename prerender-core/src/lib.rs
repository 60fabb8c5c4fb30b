//! Prerender Core
//!
//! Hydrating list bindings: attach reactive state to list markup that was
//! rendered on the server, then keep the markup in sync with the list
//! through minimal inserts and removals.
//!
//! It implements:
//!
//! - A small document model with html5ever-based markup import
//! - Reactive primitives (signals, observable arrays, computed lists)
//! - Binding contexts and a declarative `data-bind` provider
//! - The hydrating list binding and its frame-batched render queue
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `dom`: Document arena, markup import/serialization, node spans
//! - `reactive`: Signals, dependency tracking, array diffing
//! - `binding`: Binding contexts, field writers, binding providers
//! - `foreach`: Template store, change classifier, render scheduler and
//!   list synchronizer
//!
//! # Example
//!
//! ```rust,ignore
//! use prerender_core::prelude::*;
//! use serde_json::json;
//!
//! let doc = Document::from_html(r#"
//!     <ul id="todos">
//!       <li data-init data-bind="text: title">Write docs</li>
//!       <li data-template data-bind="text: title"></li>
//!     </ul>"#);
//! let todos = ObservableArray::new(vec![json!({"title": "Write docs"})]);
//! let host = Host::with_frame_timer(doc.clone())?;
//!
//! let list = doc.get_element_by_id("todos").unwrap();
//! let binding = ForeachBinding::bind(&host, list, todos.clone(), &BindingContext::root(json!({})))?;
//!
//! // Both land in the same frame.
//! todos.push(json!({"title": "Ship"}));
//! todos.shift();
//! ```

pub mod binding;
pub mod dom;
pub mod error;
pub mod foreach;
pub mod reactive;

pub use error::{HydrateError, Result};

/// The types most callers need.
pub mod prelude {
    pub use crate::binding::{BindingContext, BindingProvider, DeclarativeBinder, FieldWriters};
    pub use crate::dom::{Document, NodeId};
    pub use crate::error::{HydrateError, Result};
    pub use crate::foreach::{
        Collection, ForeachBinding, ForeachOptions, ForeachSettings, ForeachSource, Host,
        ImmediateScheduler, ManualScheduler, TimerScheduler,
    };
    pub use crate::reactive::{ComputedList, ObservableArray, Signal};
}
