//! Host Operations
//!
//! The reconciler never touches a concrete UI tree. Every structural change
//! goes through [`HostOps`], so the same diff drives an in-memory tree in
//! tests and any other host a caller plugs in.
//!
//! Host nodes are referred to by opaque [`NodeId`] handles allocated by the
//! host.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::value::Value;

/// Unique identifier for a host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What kind of node to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostNodeKind<'a> {
    /// An element with the given tag.
    Element(&'a str),
    /// A text node with the given content.
    Text(&'a str),
}

/// Primitive operations a host must provide.
pub trait HostOps {
    /// Create a detached node.
    fn create_node(&self, kind: HostNodeKind<'_>) -> NodeId;

    /// Apply an attribute or listener change. `Undefined` on either side
    /// means "absent": `prev == Undefined` adds, `next == Undefined`
    /// removes.
    fn patch_attribute(&self, node: NodeId, key: &str, prev: &Value, next: &Value);

    /// Insert `child` into `parent` before `anchor`, or append it when
    /// `anchor` is `None`. Inserting an attached node moves it.
    fn insert(&self, child: NodeId, parent: NodeId, anchor: Option<NodeId>);

    /// Detach `node` from its parent. The renderer never reuses a removed
    /// node, so a host may free it together with its descendants.
    fn remove(&self, node: NodeId);

    /// Replace the text of a text node, or all children of an element with a
    /// single text run.
    fn set_text_content(&self, node: NodeId, text: &str);

    /// The node's current parent.
    fn parent_node(&self, node: NodeId) -> Option<NodeId>;

    /// The node's next sibling.
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;
}
