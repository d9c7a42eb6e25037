//! Components
//!
//! A [`Component`] definition bundles an optional `setup` function and an
//! optional `render` function. Mounting a component vnode creates a
//! [`ComponentInstance`] that lives in the renderer's instance arena until
//! the vnode is unmounted.
//!
//! # Lifecycle
//!
//! 1. **Setup** runs once per instance, untracked, with the instance set as
//!    the renderer's current instance. It receives a readonly view of the
//!    props and a [`SetupContext`], and returns either state (whose refs are
//!    unwrapped for rendering) or a render function.
//!
//! 2. **Render** runs inside the instance's render effect. Reactive reads
//!    made while rendering subscribe the effect; when one of them changes,
//!    the effect's scheduler queues the instance's update job.
//!
//! 3. **Update** happens either through the job queue (own state changed) or
//!    synchronously when the parent re-renders with different props.
//!
//! # Provide / Inject
//!
//! Every instance resolves injections through a chain of [`Provides`]
//! layers. An instance starts out sharing its parent's layer and gets its
//! own layer on its first `provide`. Lookups start at the parent's layer,
//! so a component never injects its own provisions.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::host::NodeId;
use super::slots::render_slot;
use super::vnode::{Slots, VNode};
use crate::error::RenderError;
use crate::reactive::{ProxyRefs, Reactive, Runner, Runtime};
use crate::scheduler::Job;
use crate::value::{Object, PropertyKey, Value};

/// `setup(props, ctx)`.
pub type SetupFn = Rc<dyn Fn(&Reactive, &SetupContext) -> SetupResult>;

/// `render(ctx)`.
pub type RenderFn = Rc<dyn Fn(&RenderContext) -> VNode>;

/// What `setup` hands back.
pub enum SetupResult {
    /// Nothing; the definition's render function is used.
    None,
    /// State exposed to the render function. Refs inside are unwrapped.
    State(Value),
    /// A render function, taking precedence over the definition's.
    Render(RenderFn),
}

impl SetupResult {
    /// Wrap a render closure.
    pub fn render<F>(render: F) -> Self
    where
        F: Fn(&RenderContext) -> VNode + 'static,
    {
        SetupResult::Render(Rc::new(render))
    }

    /// Expose state to the render function.
    pub fn state(state: impl Into<Value>) -> Self {
        SetupResult::State(state.into())
    }
}

/// A component definition.
pub struct Component {
    name: Rc<str>,
    setup: Option<SetupFn>,
    render: Option<RenderFn>,
}

impl Component {
    /// Start a definition with the given name.
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            setup: None,
            render: None,
        }
    }

    pub fn setup<F>(mut self, setup: F) -> Self
    where
        F: Fn(&Reactive, &SetupContext) -> SetupResult + 'static,
    {
        self.setup = Some(Rc::new(setup));
        self
    }

    pub fn render<F>(mut self, render: F) -> Self
    where
        F: Fn(&RenderContext) -> VNode + 'static,
    {
        self.render = Some(Rc::new(render));
        self
    }

    /// Finish the definition. Vnodes refer to definitions by `Rc` identity.
    pub fn build(self) -> Rc<Self> {
        Rc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn setup_fn(&self) -> Option<&SetupFn> {
        self.setup.as_ref()
    }

    pub(crate) fn render_fn(&self) -> Option<&RenderFn> {
        self.render.as_ref()
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("setup", &self.setup.is_some())
            .field("render", &self.render.is_some())
            .finish()
    }
}

/// Unique identifier for a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// One layer of provided values.
#[derive(Default)]
pub struct Provides {
    values: RefCell<IndexMap<PropertyKey, Value>>,
    parent: Option<Rc<Provides>>,
}

impl Provides {
    pub(crate) fn root() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn child_of(parent: &Rc<Provides>) -> Rc<Self> {
        Rc::new(Self {
            values: RefCell::new(IndexMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    pub(crate) fn insert(&self, key: PropertyKey, value: Value) {
        self.values.borrow_mut().insert(key, value);
    }

    /// Find `key` in this layer or the nearest ancestor layer.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.values.borrow().get(key) {
            return Some(value.clone());
        }
        self.parent.as_ref()?.lookup(key)
    }
}

impl fmt::Debug for Provides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provides")
            .field("keys", &self.values.borrow().keys().collect::<Vec<_>>())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

/// `event-name` / `event_name` to `eventName`.
fn camelize(event: &str) -> String {
    let mut out = String::with_capacity(event.len());
    let mut upper = false;
    for c in event.chars() {
        if c == '-' || c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Prop key that holds the handler for `event`.
pub fn handler_key(event: &str) -> String {
    let camel = camelize(event);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => format!("on{}{}", first.to_uppercase(), chars.as_str()),
        None => "on".to_string(),
    }
}

/// Emits events to handlers passed in as props.
#[derive(Clone, Debug)]
pub struct Emitter {
    props: Object,
}

impl Emitter {
    /// Call the `on<Event>` prop with `args`. Missing handlers are skipped.
    /// Returns whether a handler ran.
    pub fn emit(&self, event: &str, args: &[Value]) -> bool {
        self.props.get(&handler_key(event)).call(args).is_some()
    }
}

/// A mounted component.
pub struct ComponentInstance {
    pub(crate) id: InstanceId,
    pub(crate) def: Rc<Component>,
    pub(crate) parent: Option<InstanceId>,
    pub(crate) vnode: RefCell<VNode>,
    pub(crate) next: RefCell<Option<VNode>>,
    pub(crate) props: Object,
    pub(crate) props_state: Reactive,
    pub(crate) props_view: Reactive,
    pub(crate) slots: RefCell<Slots>,
    pub(crate) provides: RefCell<Rc<Provides>>,
    pub(crate) parent_provides: Rc<Provides>,
    pub(crate) setup_state: RefCell<Option<ProxyRefs>>,
    pub(crate) render: RefCell<Option<RenderFn>>,
    pub(crate) sub_tree: RefCell<Option<VNode>>,
    pub(crate) is_mounted: Cell<bool>,
    pub(crate) update: RefCell<Option<Runner>>,
    pub(crate) job: RefCell<Option<Job>>,
    pub(crate) error: RefCell<Option<RenderError>>,
    pub(crate) container: Cell<NodeId>,
    pub(crate) runtime: Runtime,
}

impl ComponentInstance {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub fn parent(&self) -> Option<InstanceId> {
        self.parent
    }

    /// Readonly view of the props.
    pub fn props(&self) -> &Reactive {
        &self.props_view
    }

    pub fn is_mounted(&self) -> bool {
        self.is_mounted.get()
    }

    /// Root host node of the rendered tree (`$el`).
    pub fn el(&self) -> Option<NodeId> {
        self.vnode.borrow().el()
    }

    /// The tree produced by the last render.
    pub fn sub_tree(&self) -> Option<VNode> {
        self.sub_tree.borrow().clone()
    }

    /// Number of times the render effect ran.
    pub fn render_count(&self) -> usize {
        self.update
            .borrow()
            .as_ref()
            .map_or(0, |runner| runner.effect().run_count())
    }

    pub fn emitter(&self) -> Emitter {
        Emitter {
            props: self.props.clone(),
        }
    }

    pub fn emit(&self, event: &str, args: &[Value]) -> bool {
        self.emitter().emit(event, args)
    }

    /// Provide `value` to descendants under `key`.
    pub fn provide(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) {
        let own = {
            let current = self.provides.borrow();
            if Rc::ptr_eq(&current, &self.parent_provides) {
                None
            } else {
                Some(Rc::clone(&current))
            }
        };
        let own = own.unwrap_or_else(|| {
            let layer = Provides::child_of(&self.parent_provides);
            *self.provides.borrow_mut() = Rc::clone(&layer);
            layer
        });
        own.insert(key.into(), value.into());
    }

    /// Look up `key` starting at the parent's provisions.
    pub fn inject(&self, key: &str) -> Option<Value> {
        self.parent_provides.lookup(key)
    }

    /// Like [`inject`](Self::inject) with a fallback. A function fallback is
    /// called to produce the value.
    pub fn inject_or(&self, key: &str, default: Value) -> Value {
        match self.inject(key) {
            Some(value) => value,
            None => match &default {
                Value::Func(factory) => factory.call(&[]),
                _ => default,
            },
        }
    }

    pub(crate) fn has_render(&self) -> bool {
        self.render.borrow().is_some()
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("id", &self.id)
            .field("name", &self.def.name())
            .field("parent", &self.parent)
            .field("is_mounted", &self.is_mounted.get())
            .finish()
    }
}

/// Handed to `setup`.
pub struct SetupContext {
    pub(crate) instance: Rc<ComponentInstance>,
}

impl SetupContext {
    /// Emit an event to the parent's `on<Event>` handler.
    pub fn emit(&self, event: &str, args: &[Value]) -> bool {
        self.instance.emit(event, args)
    }

    /// An emitter that can be moved into closures.
    pub fn emitter(&self) -> Emitter {
        self.instance.emitter()
    }

    pub fn provide(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) {
        self.instance.provide(key, value);
    }

    pub fn inject(&self, key: &str) -> Option<Value> {
        self.instance.inject(key)
    }

    pub fn inject_or(&self, key: &str, default: Value) -> Value {
        self.instance.inject_or(key, default)
    }

    /// The instance being set up.
    pub fn instance(&self) -> &Rc<ComponentInstance> {
        &self.instance
    }

    pub fn runtime(&self) -> &Runtime {
        &self.instance.runtime
    }
}

/// Handed to render functions.
pub struct RenderContext {
    pub(crate) instance: Rc<ComponentInstance>,
}

impl RenderContext {
    /// Resolve `key` against setup state first, then props.
    pub fn get(&self, key: &str) -> Value {
        let state = self.instance.setup_state.borrow().clone();
        if let Some(state) = state {
            if state.has(key) {
                return state.get(key);
            }
        }
        self.instance.props_view.get(key)
    }

    /// Write setup state. Refs are written through.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> bool {
        let state = self.instance.setup_state.borrow().clone();
        match state {
            Some(state) => state.set(key, value),
            None => false,
        }
    }

    /// `$el`.
    pub fn el(&self) -> Option<NodeId> {
        self.instance.el()
    }

    /// `$slots`.
    pub fn slots(&self) -> Slots {
        self.instance.slots.borrow().clone()
    }

    /// `$props`.
    pub fn props(&self) -> &Reactive {
        &self.instance.props_view
    }

    pub fn emit(&self, event: &str, args: &[Value]) -> bool {
        self.instance.emit(event, args)
    }

    pub fn emitter(&self) -> Emitter {
        self.instance.emitter()
    }

    /// Render the named slot with `props`. `None` if the slot was not
    /// passed.
    pub fn render_slot(&self, name: &str, props: Value) -> Option<VNode> {
        render_slot(&self.instance.slots.borrow(), name, &props)
    }

    pub fn instance(&self) -> &Rc<ComponentInstance> {
        &self.instance
    }

    pub fn runtime(&self) -> &Runtime {
        &self.instance.runtime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_keys() {
        assert_eq!(handler_key("click"), "onClick");
        assert_eq!(handler_key("update-value"), "onUpdateValue");
        assert_eq!(handler_key("add_item"), "onAddItem");
    }

    #[test]
    fn provides_layers_shadow_parents() {
        let root = Provides::root();
        root.insert("theme".into(), "dark".into());
        root.insert("lang".into(), "en".into());

        let child = Provides::child_of(&root);
        child.insert("theme".into(), "light".into());

        assert_eq!(child.lookup("theme"), Some(Value::from("light")));
        assert_eq!(child.lookup("lang"), Some(Value::from("en")));
        assert_eq!(child.lookup("missing"), None);
        assert_eq!(root.lookup("theme"), Some(Value::from("dark")));
    }

    #[test]
    fn emitter_calls_matching_handler() {
        let props = Object::new();
        let emitter = Emitter {
            props: props.clone(),
        };
        assert!(!emitter.emit("change", &[]));

        props.set(
            "onChange",
            crate::value::callback(|args| args.first().cloned().unwrap_or_default()),
        );
        assert!(emitter.emit("change", &[Value::from(1)]));
    }
}
