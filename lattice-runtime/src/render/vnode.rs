//! Virtual Nodes
//!
//! A [`VNode`] is a lightweight description of one piece of UI: an element,
//! a text run, a fragment of siblings, or a component. Render functions
//! build a fresh tree of vnodes on every run; the reconciler diffs the new
//! tree against the previous one and applies the difference to the host.
//!
//! # Shape
//!
//! Node kind and children representation are closed enums, so combinations
//! that make no sense (a text node with named slots, say) cannot be built:
//!
//! - [`VNodeType`]: `Element`, `Component`, `Fragment`, `Text`
//! - [`Children`]: `None`, `Text`, `List`, `Slots`
//!
//! # Host Bookkeeping
//!
//! Once mounted, a vnode remembers its host node (`el`), a fragment also its
//! end anchor, and a component vnode the instance it created. A vnode
//! describes one position in one tree; to mount the same description twice
//! use [`VNode::fresh_copy`].

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::component::{Component, InstanceId};
use super::host::NodeId;
use crate::value::{PropertyKey, Value};

/// Properties of a vnode: attributes and listeners for elements, props for
/// components.
pub type Props = IndexMap<PropertyKey, Value>;

/// A slot renders vnodes from the props its owner passes in.
pub type Slot = Rc<dyn Fn(&Value) -> Vec<VNode>>;

/// Named slots.
pub type Slots = IndexMap<PropertyKey, Slot>;

/// Name of the slot that receives plain children passed to a component.
pub const DEFAULT_SLOT: &str = "default";

/// The kind of a vnode.
#[derive(Clone)]
pub enum VNodeType {
    /// A host element with the given tag.
    Element(Rc<str>),
    /// A component.
    Component(Rc<Component>),
    /// A sequence of siblings without a host node of its own.
    Fragment,
    /// A text run.
    Text,
}

impl VNodeType {
    /// Equal kind, and for elements and components the same tag or
    /// definition.
    pub fn same_as(&self, other: &VNodeType) -> bool {
        match (self, other) {
            (VNodeType::Element(a), VNodeType::Element(b)) => a == b,
            (VNodeType::Component(a), VNodeType::Component(b)) => Rc::ptr_eq(a, b),
            (VNodeType::Fragment, VNodeType::Fragment) | (VNodeType::Text, VNodeType::Text) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for VNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNodeType::Element(tag) => write!(f, "Element({tag})"),
            VNodeType::Component(def) => write!(f, "Component({})", def.name()),
            VNodeType::Fragment => write!(f, "Fragment"),
            VNodeType::Text => write!(f, "Text"),
        }
    }
}

impl From<&str> for VNodeType {
    fn from(tag: &str) -> Self {
        VNodeType::Element(tag.into())
    }
}

impl From<Rc<Component>> for VNodeType {
    fn from(def: Rc<Component>) -> Self {
        VNodeType::Component(def)
    }
}

impl From<&Rc<Component>> for VNodeType {
    fn from(def: &Rc<Component>) -> Self {
        VNodeType::Component(Rc::clone(def))
    }
}

/// Structural identity of a vnode among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Rc<str>),
    Int(i64),
}

impl Key {
    /// Derive a key from a prop value. `undefined` and `null` mean "no
    /// key".
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Undefined | Value::Null => None,
            Value::Str(s) => Some(Key::Str(s.clone())),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.2e18 => Some(Key::Int(*n as i64)),
            other => Some(Key::Str(other.to_display_string().into())),
        }
    }
}

/// Children of a vnode.
#[derive(Clone, Default)]
pub enum Children {
    #[default]
    None,
    Text(Rc<str>),
    List(Vec<VNode>),
    Slots(Slots),
}

impl Children {
    /// Build named slots.
    pub fn slots<I, K, F>(slots: I) -> Self
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<PropertyKey>,
        F: Fn(&Value) -> Vec<VNode> + 'static,
    {
        Children::Slots(
            slots
                .into_iter()
                .map(|(name, f)| (name.into(), Rc::new(f) as Slot))
                .collect(),
        )
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Children::None)
    }
}

impl fmt::Debug for Children {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Children::None => write!(f, "None"),
            Children::Text(text) => write!(f, "Text({text:?})"),
            Children::List(list) => f.debug_list().entries(list).finish(),
            Children::Slots(slots) => f.debug_set().entries(slots.keys()).finish(),
        }
    }
}

impl From<()> for Children {
    fn from(_: ()) -> Self {
        Children::None
    }
}

impl From<&str> for Children {
    fn from(text: &str) -> Self {
        Children::Text(text.into())
    }
}

impl From<String> for Children {
    fn from(text: String) -> Self {
        Children::Text(text.into())
    }
}

impl From<Rc<str>> for Children {
    fn from(text: Rc<str>) -> Self {
        Children::Text(text)
    }
}

impl From<Vec<VNode>> for Children {
    fn from(list: Vec<VNode>) -> Self {
        Children::List(list)
    }
}

impl<const N: usize> From<[VNode; N]> for Children {
    fn from(list: [VNode; N]) -> Self {
        Children::List(list.into())
    }
}

impl From<Slots> for Children {
    fn from(slots: Slots) -> Self {
        Children::Slots(slots)
    }
}

struct VNodeInner {
    ty: VNodeType,
    props: Props,
    key: Option<Key>,
    children: Children,
    el: Cell<Option<NodeId>>,
    anchor: Cell<Option<NodeId>>,
    component: Cell<Option<InstanceId>>,
}

/// A node in a virtual tree. Clones share the same node.
#[derive(Clone)]
pub struct VNode(Rc<VNodeInner>);

impl VNode {
    fn from_parts(ty: VNodeType, props: Props, key: Option<Key>, children: Children) -> Self {
        Self(Rc::new(VNodeInner {
            ty,
            props,
            key,
            children,
            el: Cell::new(None),
            anchor: Cell::new(None),
            component: Cell::new(None),
        }))
    }

    pub fn ty(&self) -> &VNodeType {
        &self.0.ty
    }

    /// Props, without the `key`.
    pub fn props(&self) -> &Props {
        &self.0.props
    }

    pub fn key(&self) -> Option<&Key> {
        self.0.key.as_ref()
    }

    pub fn children(&self) -> &Children {
        &self.0.children
    }

    /// Host node: the element or text node, a fragment's start anchor, or the
    /// root host node of a component's rendered tree.
    pub fn el(&self) -> Option<NodeId> {
        self.0.el.get()
    }

    pub(crate) fn set_el(&self, el: Option<NodeId>) {
        self.0.el.set(el);
    }

    /// End anchor of a mounted fragment.
    pub fn anchor(&self) -> Option<NodeId> {
        self.0.anchor.get()
    }

    pub(crate) fn set_anchor(&self, anchor: Option<NodeId>) {
        self.0.anchor.set(anchor);
    }

    /// Instance created for a mounted component vnode.
    pub fn component(&self) -> Option<InstanceId> {
        self.0.component.get()
    }

    pub(crate) fn set_component(&self, id: Option<InstanceId>) {
        self.0.component.set(id);
    }

    /// Text of a text vnode.
    pub fn text(&self) -> Option<&str> {
        match (&self.0.ty, &self.0.children) {
            (VNodeType::Text, Children::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// An unmounted copy sharing the same description.
    pub fn fresh_copy(&self) -> VNode {
        Self::from_parts(
            self.0.ty.clone(),
            self.0.props.clone(),
            self.0.key.clone(),
            self.0.children.clone(),
        )
    }

    /// Whether both handles are the same node.
    pub fn ptr_eq(&self, other: &VNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("VNode");
        s.field("ty", &self.0.ty);
        if let Some(key) = &self.0.key {
            s.field("key", key);
        }
        if !self.0.props.is_empty() {
            s.field("props", &self.0.props.keys().collect::<Vec<_>>());
        }
        s.field("children", &self.0.children);
        if let Some(el) = self.0.el.get() {
            s.field("el", &el);
        }
        s.finish()
    }
}

/// Same kind and same key: the reconciler patches such a pair in place
/// instead of replacing it.
pub fn is_same_vnode_type(a: &VNode, b: &VNode) -> bool {
    a.0.ty.same_as(&b.0.ty) && a.0.key == b.0.key
}

/// Create a vnode.
///
/// The `key` prop is lifted out of `props` into the vnode's key. Text
/// children of a fragment become a single text vnode.
pub fn h(ty: impl Into<VNodeType>, props: Props, children: impl Into<Children>) -> VNode {
    let ty = ty.into();
    let mut props = props;
    let key = props.shift_remove("key").as_ref().and_then(Key::from_value);

    let children = match (&ty, children.into()) {
        (VNodeType::Fragment, Children::Text(t)) => Children::List(vec![text(t)]),
        (VNodeType::Text, Children::List(_) | Children::Slots(_)) => Children::Text("".into()),
        (_, children) => children,
    };
    VNode::from_parts(ty, props, key, children)
}

/// Create a text vnode.
pub fn text(content: impl Into<Rc<str>>) -> VNode {
    VNode::from_parts(VNodeType::Text, Props::new(), None, Children::Text(content.into()))
}

/// Create a fragment of siblings.
pub fn fragment(children: impl Into<Children>) -> VNode {
    h(VNodeType::Fragment, Props::new(), children)
}

/// Create a keyed fragment.
pub fn keyed_fragment(key: impl Into<Value>, children: impl Into<Children>) -> VNode {
    let mut props = Props::new();
    props.insert("key".into(), key.into());
    h(VNodeType::Fragment, props, children)
}
