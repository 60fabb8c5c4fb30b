//! Document Model
//!
//! A small DOM: enough structure to hold server-rendered markup, clone
//! templates, and apply the inserts and removals a list binding performs.
//!
//! # Design Decisions
//!
//! 1. Nodes live in an arena and are addressed by `NodeId`. Removing a node
//!    puts its subtree's slots on a free list, so a binding that keeps its
//!    item count steady keeps the arena size steady too. Anchor lists only
//!    ever point at attached nodes.
//!
//! 2. The `Document` handle is cloned into every closure that needs it.
//!    Each call locks briefly, so callbacks fired by the document may call
//!    back into it.
//!
//! 3. Insertion points are expressed through `NodeSpan`, so the code that
//!    renders items never checks whether it is working inside an element or
//!    inside a comment-delimited virtual element.

mod document;
mod markup;
mod node;
mod span;

pub use document::{DisposeCallback, Document};
pub use markup::FragmentContext;
pub use node::{Mutation, NodeId, NodeKind};
pub use span::{
    is_end_comment, is_start_comment, is_virtual_start, span_for, ElementSpan, NodeSpan,
    VirtualRangeSpan,
};
