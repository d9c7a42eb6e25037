//! Rendering Pipeline
//!
//! This module turns vnode trees into host nodes and keeps them in sync
//! with reactive state.
//!
//! # How It Works
//!
//! ```text
//! render fn ──> VNode tree ──> patch(old, new) ──> HostOps calls
//!      ^                                              │
//!      └──── render effect re-runs via job queue <────┘ (state change)
//! ```
//!
//! 1. A component's render function builds a [`VNode`] tree.
//! 2. The [`Renderer`] diffs it against the previous tree and issues the
//!    minimal set of [`HostOps`] calls. Keyed child lists are diffed with a
//!    longest-increasing-subsequence pass so stable nodes never move.
//! 3. The render runs inside an effect; when state it read changes, the
//!    component's update job is queued on the [`Runtime`](crate::Runtime)
//!    and re-runs on the next flush.
//!
//! [`MemoryHost`] is an in-memory host that records every operation, for
//! tests and headless use.

mod app;
mod children;
mod component;
mod host;
mod memory;
mod renderer;
mod slots;
mod vnode;

pub use app::App;
pub use component::{
    handler_key, Component, ComponentInstance, Emitter, InstanceId, Provides, RenderContext, RenderFn,
    SetupContext, SetupFn, SetupResult,
};
pub use host::{HostNodeKind, HostOps, NodeId};
pub use memory::{is_listener, HostOp, MemoryHost};
pub use renderer::Renderer;
pub use slots::render_slot;
pub use vnode::{
    fragment, h, is_same_vnode_type, keyed_fragment, text, Children, Key, Props, Slot, Slots, VNode,
    VNodeType, DEFAULT_SLOT,
};
