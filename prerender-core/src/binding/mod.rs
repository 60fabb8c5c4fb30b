//! Bindings
//!
//! Binding contexts and the provider that applies bindings to nodes. List
//! bindings create one child context per item and hand each rendered or
//! pre-rendered span to a `BindingProvider`.

mod context;
mod provider;

pub use context::{BindingContext, FieldWriter, FieldWriters};
pub use provider::{BindingProvider, DeclarativeBinder, BINDING_ATTRIBUTE};
