//! In-Memory Host
//!
//! [`MemoryHost`] implements [`HostOps`] over a plain node table. It is the
//! host used by the tests and by headless rendering.
//!
//! Besides the tree itself it keeps a log of every operation it performed
//! ([`HostOp`]), so callers can assert on *how* the reconciler reached a
//! state and not only on the state: a reorder that should be a single move
//! shows up as exactly one [`HostOp::Move`].
//!
//! Props named `on` followed by an uppercase letter are stored as event
//! listeners and can be fired with [`MemoryHost::dispatch`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write as _;

use indexmap::IndexMap;
use tracing::trace;

use super::host::{HostNodeKind, HostOps, NodeId};
use crate::value::Value;

/// One operation performed on a [`MemoryHost`].
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    CreateElement { node: NodeId, tag: String },
    CreateText { node: NodeId, text: String },
    SetAttribute { node: NodeId, key: String, value: Value },
    RemoveAttribute { node: NodeId, key: String },
    /// A detached node was inserted.
    Insert { child: NodeId, parent: NodeId, anchor: Option<NodeId> },
    /// An attached node was re-inserted somewhere else.
    Move { child: NodeId, parent: NodeId, anchor: Option<NodeId> },
    Remove { node: NodeId },
    SetText { node: NodeId, text: String },
}

#[derive(Debug)]
enum NodeData {
    Element {
        tag: String,
        attributes: IndexMap<String, Value>,
        listeners: IndexMap<String, Value>,
    },
    Text(String),
}

#[derive(Debug)]
struct HostNode {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Whether a prop key names an event listener (`onClick`, `onUpdate`...).
pub fn is_listener(key: &str) -> bool {
    let bytes = key.as_bytes();
    bytes.len() > 2 && bytes.starts_with(b"on") && bytes[2].is_ascii_uppercase()
}

/// In-memory host tree.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: RefCell<HashMap<NodeId, HostNode>>,
    ops: RefCell<Vec<HostOp>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a root element to render into. Not recorded as an operation.
    pub fn create_container(&self) -> NodeId {
        let id = NodeId::new();
        self.nodes.borrow_mut().insert(
            id,
            HostNode {
                data: NodeData::Element {
                    tag: "root".to_string(),
                    attributes: IndexMap::new(),
                    listeners: IndexMap::new(),
                },
                parent: None,
                children: Vec::new(),
            },
        );
        id
    }

    /// Children of `node`, in order.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .borrow()
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Children of `node` that are not empty text nodes (fragment anchors
    /// are empty text nodes).
    pub fn visible_children(&self, node: NodeId) -> Vec<NodeId> {
        let nodes = self.nodes.borrow();
        let Some(host) = nodes.get(&node) else {
            return Vec::new();
        };
        host.children
            .iter()
            .copied()
            .filter(|child| !matches!(nodes.get(child), Some(HostNode { data: NodeData::Text(t), .. }) if t.is_empty()))
            .collect()
    }

    /// Text content of a node and all its descendants.
    pub fn text(&self, node: NodeId) -> String {
        let nodes = self.nodes.borrow();
        let mut out = String::new();
        collect_text(&nodes, node, &mut out);
        out
    }

    /// Tag of an element, `None` for text nodes.
    pub fn tag(&self, node: NodeId) -> Option<String> {
        match &self.nodes.borrow().get(&node)?.data {
            NodeData::Element { tag, .. } => Some(tag.clone()),
            NodeData::Text(_) => None,
        }
    }

    /// Current value of an attribute or listener.
    pub fn attribute(&self, node: NodeId, key: &str) -> Option<Value> {
        match &self.nodes.borrow().get(&node)?.data {
            NodeData::Element {
                attributes,
                listeners,
                ..
            } => attributes.get(key).or_else(|| listeners.get(key)).cloned(),
            NodeData::Text(_) => None,
        }
    }

    /// Serialize the children of `node` to an HTML-like string. Listeners
    /// are omitted.
    pub fn serialize(&self, node: NodeId) -> String {
        let nodes = self.nodes.borrow();
        let mut out = String::new();
        if let Some(host) = nodes.get(&node) {
            for child in &host.children {
                serialize_node(&nodes, *child, &mut out);
            }
        }
        out
    }

    /// Operations recorded since the last [`clear_ops`](Self::clear_ops).
    pub fn ops(&self) -> Vec<HostOp> {
        self.ops.borrow().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.borrow_mut().clear();
    }

    /// Number of recorded moves.
    pub fn move_count(&self) -> usize {
        self.ops
            .borrow()
            .iter()
            .filter(|op| matches!(op, HostOp::Move { .. }))
            .count()
    }

    /// Number of live nodes, containers included. Removed subtrees are
    /// dropped from the table.
    pub fn node_count(&self) -> usize {
        self.nodes.borrow().len()
    }

    /// Fire `event` on `node`: calls the `on<Event>` listener with `args`.
    /// Returns `false` if no listener is registered.
    pub fn dispatch(&self, node: NodeId, event: &str, args: &[Value]) -> bool {
        let key = listener_key(event);
        let handler = match self.nodes.borrow().get(&node).map(|n| &n.data) {
            Some(NodeData::Element { listeners, .. }) => listeners.get(&key).cloned(),
            _ => None,
        };
        // Borrow released: the handler may mutate state that re-renders.
        match handler {
            Some(handler) => handler.call(args).is_some(),
            None => false,
        }
    }

    fn record(&self, op: HostOp) {
        self.ops.borrow_mut().push(op);
    }

    fn detach(nodes: &mut HashMap<NodeId, HostNode>, node: NodeId) -> Option<NodeId> {
        let parent = nodes.get_mut(&node)?.parent.take()?;
        if let Some(parent_node) = nodes.get_mut(&parent) {
            parent_node.children.retain(|c| *c != node);
        }
        Some(parent)
    }

    fn drop_subtree(nodes: &mut HashMap<NodeId, HostNode>, node: NodeId) {
        if let Some(host) = nodes.remove(&node) {
            for child in host.children {
                Self::drop_subtree(nodes, child);
            }
        }
    }
}

fn listener_key(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => format!("on{}{}", first.to_uppercase(), chars.as_str()),
        None => "on".to_string(),
    }
}

fn collect_text(nodes: &HashMap<NodeId, HostNode>, node: NodeId, out: &mut String) {
    let Some(host) = nodes.get(&node) else {
        return;
    };
    match &host.data {
        NodeData::Text(text) => out.push_str(text),
        NodeData::Element { .. } => {
            for child in &host.children {
                collect_text(nodes, *child, out);
            }
        }
    }
}

fn serialize_node(nodes: &HashMap<NodeId, HostNode>, node: NodeId, out: &mut String) {
    let Some(host) = nodes.get(&node) else {
        return;
    };
    match &host.data {
        NodeData::Text(text) => out.push_str(text),
        NodeData::Element {
            tag, attributes, ..
        } => {
            out.push('<');
            out.push_str(tag);
            for (key, value) in attributes {
                let _ = write!(out, " {key}=\"{}\"", value.to_display_string());
            }
            out.push('>');
            for child in &host.children {
                serialize_node(nodes, *child, out);
            }
            let _ = write!(out, "</{tag}>");
        }
    }
}

impl HostOps for MemoryHost {
    fn create_node(&self, kind: HostNodeKind<'_>) -> NodeId {
        let id = NodeId::new();
        let (data, op) = match kind {
            HostNodeKind::Element(tag) => (
                NodeData::Element {
                    tag: tag.to_string(),
                    attributes: IndexMap::new(),
                    listeners: IndexMap::new(),
                },
                HostOp::CreateElement {
                    node: id,
                    tag: tag.to_string(),
                },
            ),
            HostNodeKind::Text(text) => (
                NodeData::Text(text.to_string()),
                HostOp::CreateText {
                    node: id,
                    text: text.to_string(),
                },
            ),
        };
        self.nodes.borrow_mut().insert(
            id,
            HostNode {
                data,
                parent: None,
                children: Vec::new(),
            },
        );
        self.record(op);
        id
    }

    fn patch_attribute(&self, node: NodeId, key: &str, _prev: &Value, next: &Value) {
        {
            let mut nodes = self.nodes.borrow_mut();
            let Some(HostNode {
                data: NodeData::Element {
                    attributes,
                    listeners,
                    ..
                },
                ..
            }) = nodes.get_mut(&node)
            else {
                return;
            };
            let map = if is_listener(key) { listeners } else { attributes };
            if next.is_undefined() {
                map.shift_remove(key);
            } else {
                map.insert(key.to_string(), next.clone());
            }
        }

        let key = key.to_string();
        if next.is_undefined() {
            self.record(HostOp::RemoveAttribute { node, key });
        } else {
            self.record(HostOp::SetAttribute {
                node,
                key,
                value: next.clone(),
            });
        }
    }

    fn insert(&self, child: NodeId, parent: NodeId, anchor: Option<NodeId>) {
        let moved = {
            let mut nodes = self.nodes.borrow_mut();
            let moved = Self::detach(&mut nodes, child).is_some();

            let Some(parent_node) = nodes.get_mut(&parent) else {
                return;
            };
            let index = anchor
                .and_then(|a| parent_node.children.iter().position(|c| *c == a))
                .unwrap_or(parent_node.children.len());
            parent_node.children.insert(index, child);
            if let Some(child_node) = nodes.get_mut(&child) {
                child_node.parent = Some(parent);
            }
            moved
        };

        if moved {
            trace!(%child, %parent, "host move");
            self.record(HostOp::Move {
                child,
                parent,
                anchor,
            });
        } else {
            self.record(HostOp::Insert {
                child,
                parent,
                anchor,
            });
        }
    }

    fn remove(&self, node: NodeId) {
        let detached = {
            let mut nodes = self.nodes.borrow_mut();
            let detached = Self::detach(&mut nodes, node).is_some();
            if detached {
                Self::drop_subtree(&mut nodes, node);
            }
            detached
        };
        if detached {
            self.record(HostOp::Remove { node });
        }
    }

    fn set_text_content(&self, node: NodeId, text: &str) {
        {
            let mut nodes = self.nodes.borrow_mut();
            let Some(host) = nodes.get_mut(&node) else {
                return;
            };
            if let NodeData::Text(content) = &mut host.data {
                *content = text.to_string();
            } else {
                let old_children = std::mem::take(&mut host.children);
                for child in old_children {
                    Self::drop_subtree(&mut nodes, child);
                }
                if !text.is_empty() {
                    let text_id = NodeId::new();
                    nodes.insert(
                        text_id,
                        HostNode {
                            data: NodeData::Text(text.to_string()),
                            parent: Some(node),
                            children: Vec::new(),
                        },
                    );
                    if let Some(host) = nodes.get_mut(&node) {
                        host.children.push(text_id);
                    }
                }
            }
        }
        self.record(HostOp::SetText {
            node,
            text: text.to_string(),
        });
    }

    fn parent_node(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.borrow().get(&node)?.parent
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let nodes = self.nodes.borrow();
        let parent = nodes.get(&node)?.parent?;
        let siblings = &nodes.get(&parent)?.children;
        let index = siblings.iter().position(|c| *c == node)?;
        siblings.get(index + 1).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::callback;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn builds_and_serializes_a_tree() {
        let host = MemoryHost::new();
        let root = host.create_container();
        let div = host.create_node(HostNodeKind::Element("div"));
        let text = host.create_node(HostNodeKind::Text("hi"));

        host.patch_attribute(div, "id", &Value::Undefined, &Value::from("app"));
        host.insert(text, div, None);
        host.insert(div, root, None);

        assert_eq!(host.serialize(root), r#"<div id="app">hi</div>"#);
        assert_eq!(host.text(root), "hi");
        assert_eq!(host.parent_node(text), Some(div));
        assert_eq!(host.tag(div).as_deref(), Some("div"));
    }

    #[test]
    fn inserting_an_attached_node_is_a_move() {
        let host = MemoryHost::new();
        let root = host.create_container();
        let a = host.create_node(HostNodeKind::Text("a"));
        let b = host.create_node(HostNodeKind::Text("b"));
        host.insert(a, root, None);
        host.insert(b, root, None);
        host.clear_ops();

        host.insert(b, root, Some(a));
        assert_eq!(host.children(root), vec![b, a]);
        assert_eq!(host.move_count(), 1);
        assert_eq!(host.next_sibling(b), Some(a));
        assert_eq!(host.next_sibling(a), None);
    }

    #[test]
    fn set_text_content_replaces_element_children() {
        let host = MemoryHost::new();
        let root = host.create_container();
        let p = host.create_node(HostNodeKind::Element("p"));
        host.insert(p, root, None);

        host.set_text_content(root, "plain");
        assert_eq!(host.serialize(root), "plain");
        assert_eq!(host.parent_node(p), None);

        host.set_text_content(root, "");
        assert!(host.children(root).is_empty());
        assert_eq!(host.node_count(), 1);
    }

    #[test]
    fn removed_subtrees_are_dropped() {
        let host = MemoryHost::new();
        let root = host.create_container();
        let ul = host.create_node(HostNodeKind::Element("ul"));
        let li = host.create_node(HostNodeKind::Element("li"));
        let label = host.create_node(HostNodeKind::Text("x"));
        host.insert(label, li, None);
        host.insert(li, ul, None);
        host.insert(ul, root, None);
        assert_eq!(host.node_count(), 4);

        host.remove(ul);
        assert_eq!(host.node_count(), 1);
        assert_eq!(host.tag(li), None);
        assert_eq!(host.text(ul), "");
        assert!(host.children(root).is_empty());
        assert_eq!(host.ops().last(), Some(&HostOp::Remove { node: ul }));
    }

    #[test]
    fn visible_children_skip_empty_text() {
        let host = MemoryHost::new();
        let root = host.create_container();
        let start = host.create_node(HostNodeKind::Text(""));
        let item = host.create_node(HostNodeKind::Element("li"));
        let end = host.create_node(HostNodeKind::Text(""));
        host.insert(start, root, None);
        host.insert(item, root, None);
        host.insert(end, root, None);

        assert_eq!(host.children(root), vec![start, item, end]);
        assert_eq!(host.visible_children(root), vec![item]);
    }

    #[test]
    fn listeners_are_dispatched_not_serialized() {
        let host = MemoryHost::new();
        let root = host.create_container();
        let button = host.create_node(HostNodeKind::Element("button"));
        host.insert(button, root, None);

        let clicks = Rc::new(Cell::new(0));
        let clicks_inner = clicks.clone();
        let handler = callback(move |_| {
            clicks_inner.set(clicks_inner.get() + 1);
            Value::Undefined
        });
        host.patch_attribute(button, "onClick", &Value::Undefined, &handler);

        assert_eq!(host.serialize(root), "<button></button>");
        assert!(host.dispatch(button, "click", &[]));
        assert!(!host.dispatch(button, "focus", &[]));
        assert_eq!(clicks.get(), 1);

        host.patch_attribute(button, "onClick", &handler, &Value::Undefined);
        assert!(!host.dispatch(button, "click", &[]));
    }

    #[test]
    fn listener_keys() {
        assert!(is_listener("onClick"));
        assert!(!is_listener("once"));
        assert!(!is_listener("on"));
        assert_eq!(listener_key("click"), "onClick");
    }
}
