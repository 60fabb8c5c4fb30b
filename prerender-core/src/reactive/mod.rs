//! Reactive Primitives
//!
//! The observable side of a list binding: the values it renders and the
//! change notifications that drive it.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A `Signal` is a shared mutable cell. Explicit subscribers are called on
//! every write. Reads made inside a `TrackingScope` are also recorded with
//! the global `Runtime`, which re-runs the reading computation on change.
//!
//! ## Observable arrays
//!
//! An `ObservableArray` is a shared list that publishes each mutation as a
//! sparse diff of added and deleted positions, computed by `compare_arrays`.
//!
//! ## Computed lists
//!
//! A `ComputedList` wraps a closure returning a list. It tracks the signals
//! the closure reads and publishes a diff whenever re-evaluation changes the
//! result.

mod array;
mod computed;
mod context;
mod diff;
mod runtime;
mod signal;
mod subscriber;

pub use array::{ChangeListener, ObservableArray};
pub use computed::ComputedList;
pub use context::TrackingScope;
pub use diff::{compare_arrays, ArrayChange, ChangeStatus};
pub use runtime::{Reactive, ReactiveHandle, Runtime};
pub use signal::Signal;
pub use subscriber::SubscriberId;
