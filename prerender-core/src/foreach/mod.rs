//! Hydrating List Binding
//!
//! Keeps server-rendered list markup in sync with a collection.
//!
//! # Concepts
//!
//! ## Hydration
//!
//! The markup already contains one span of nodes per item, marked
//! `data-init`, and one template span, marked `data-template`. Binding
//! attaches a scope to each existing span instead of rendering it again.
//! The template is only used for items added later.
//!
//! ## Flow
//!
//! ```text
//! collection change ─▶ ChangeMap::classify ─▶ RenderQueue ─▶ (frame) ─▶ ListSynchronizer
//! ```
//!
//! Changes that arrive before the frame fires are appended to the same
//! queue and applied in one pass.

mod binding;
mod classify;
mod config;
mod scheduler;
mod synchronizer;
mod template;

pub use binding::{ForeachBinding, Host};
pub use classify::{ChangeMap, QueuedChange};
pub use config::{
    Collection, DataChangedHook, ElementFactory, FlushHook, ForeachOptions, ForeachSettings,
    ForeachSource, SETTINGS_ATTRIBUTE,
};
pub use scheduler::{
    FlushState, FrameCallback, FrameScheduler, ImmediateScheduler, ManualScheduler, RenderQueue,
    TimerScheduler, FRAME_INTERVAL,
};
pub use synchronizer::{ListSynchronizer, SyncConfig};
pub use template::{find_live_nodes, TemplateFragment, LIVE_ITEM_ATTRIBUTE, TEMPLATE_ATTRIBUTE};
