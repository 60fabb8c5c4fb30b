//! Error types.
//!
//! Only configuration problems are reported as errors. They surface from
//! `ForeachBinding::bind` so a misconfigured page fails immediately instead
//! of silently rendering nothing. Everything that happens during a flush is
//! expected to succeed once a binding exists.

use thiserror::Error;

use crate::dom::NodeId;

/// Errors raised while setting up a hydrating binding.
#[derive(Debug, Error)]
pub enum HydrateError {
    /// No node qualified as the item template.
    #[error("no template node found (expected an element marked with `{attribute}`)")]
    TemplateNotFound {
        /// The marker attribute that was searched for, or `"*"` for named
        /// templates where any element child qualifies.
        attribute: &'static str,
    },

    /// The `name` option pointed at an element id that is not in the document.
    #[error("named template `{0}` does not exist in the document")]
    NamedTemplateMissing(String),

    /// A `<!-- ko -->` comment has no matching `<!-- /ko -->`.
    #[error("virtual element starting at {0:?} has no closing comment")]
    UnbalancedVirtualElement(NodeId),

    /// JSON settings could not be deserialized.
    #[error("invalid foreach settings: {0}")]
    InvalidSettings(#[from] serde_json::Error),

    /// The frame timer was constructed outside of a tokio runtime.
    #[error("no tokio runtime is available to drive the frame timer")]
    NoRuntime,
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, HydrateError>;
