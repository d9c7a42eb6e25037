//! Renderer
//!
//! The renderer turns vnode trees into host nodes and keeps them in sync.
//! [`Renderer::render`] is the entry point; everything below it goes
//! through a single recursive `patch(old, new, container, anchor, parent)`
//! that dispatches on the new node's kind:
//!
//! - **Text**: create the text node, or update its content in place.
//! - **Fragment**: mount or diff the children between two empty text
//!   anchors; the fragment itself has no host node.
//! - **Element**: create the node, mount children, apply props and insert
//!   it; or carry the host node forward, diff children, then diff props.
//! - **Component**: create an instance, run setup and install its render
//!   effect; or, on a parent-driven update, re-render synchronously if the
//!   props changed.
//!
//! When the old and new node differ in kind or key the old node is
//! unmounted and the new one mounted in its place.
//!
//! # Component Instances
//!
//! Instances live in an arena keyed by [`InstanceId`]. A component vnode
//! stores the id of the instance it created, and an instance refers to its
//! parent by id, so the only owner of an instance is the arena.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::app::App;
use super::component::{
    Component, ComponentInstance, InstanceId, Provides, RenderContext, SetupContext, SetupResult,
};
use super::host::{HostNodeKind, HostOps, NodeId};
use super::slots::normalize_slots;
use super::vnode::{fragment, is_same_vnode_type, Children, Props, VNode, VNodeType};
use crate::error::{RenderError, RenderResult, Warning};
use crate::reactive::{EffectOptions, ProxyMode, Reactive, Runtime};
use crate::scheduler::Job;
use crate::value::{Object, PropertyKey, Value};

pub(crate) struct RendererInner<H: HostOps + 'static> {
    pub(crate) runtime: Runtime,
    pub(crate) host: Rc<H>,
    instances: RefCell<HashMap<InstanceId, Rc<ComponentInstance>>>,
    roots: RefCell<HashMap<NodeId, VNode>>,
    current: RefCell<Option<Rc<ComponentInstance>>>,
    app_provides: RefCell<HashMap<NodeId, Rc<Provides>>>,
    root_provides: RefCell<Rc<Provides>>,
}

/// Reconciles vnode trees onto a host.
pub struct Renderer<H: HostOps + 'static> {
    inner: Rc<RendererInner<H>>,
}

impl<H: HostOps + 'static> Clone for Renderer<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<H: HostOps + 'static> Renderer<H> {
    /// Create a renderer driving `host`.
    pub fn new(runtime: Runtime, host: H) -> Self {
        Self::with_host(runtime, Rc::new(host))
    }

    /// Create a renderer over a shared host.
    pub fn with_host(runtime: Runtime, host: Rc<H>) -> Self {
        Self {
            inner: Rc::new(RendererInner {
                runtime,
                host,
                instances: RefCell::new(HashMap::new()),
                roots: RefCell::new(HashMap::new()),
                current: RefCell::new(None),
                app_provides: RefCell::new(HashMap::new()),
                root_provides: RefCell::new(Provides::root()),
            }),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    pub fn host(&self) -> &Rc<H> {
        &self.inner.host
    }

    /// Render `vnode` into `container`, patching against whatever was
    /// rendered there before.
    pub fn render(&self, vnode: VNode, container: NodeId) -> RenderResult {
        let prev = self.inner.roots.borrow().get(&container).cloned();
        let vnode = match &prev {
            Some(prev) if prev.ptr_eq(&vnode) => vnode,
            _ if vnode.el().is_some() || vnode.component().is_some() => vnode.fresh_copy(),
            _ => vnode,
        };

        let provides = self
            .inner
            .app_provides
            .borrow()
            .get(&container)
            .cloned()
            .unwrap_or_else(Provides::root);
        *self.inner.root_provides.borrow_mut() = provides;

        self.inner
            .roots
            .borrow_mut()
            .insert(container, vnode.clone());
        self.inner.patch(prev.as_ref(), &vnode, container, None, None)
    }

    /// Unmount whatever is rendered in `container`.
    pub fn unmount_root(&self, container: NodeId) -> RenderResult {
        let root = self.inner.roots.borrow_mut().remove(&container);
        self.inner.app_provides.borrow_mut().remove(&container);
        match root {
            Some(root) => {
                self.inner.unmount(&root, true);
                Ok(())
            }
            None => Err(RenderError::InvalidContainer(container.raw())),
        }
    }

    /// The vnode last rendered into `container`.
    pub fn root(&self, container: NodeId) -> Option<VNode> {
        self.inner.roots.borrow().get(&container).cloned()
    }

    /// Start an application rooted at `root`.
    pub fn create_app(&self, root: Rc<Component>) -> App<H> {
        App::new(self.clone(), root)
    }

    pub(crate) fn register_app_provides(&self, container: NodeId, provides: Rc<Provides>) {
        self.inner
            .app_provides
            .borrow_mut()
            .insert(container, provides);
    }

    /// The instance whose `setup` is running, if any.
    pub fn current_instance(&self) -> Option<Rc<ComponentInstance>> {
        self.inner.current.borrow().clone()
    }

    /// Provide a value from the component being set up.
    pub fn provide(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) {
        match self.current_instance() {
            Some(instance) => instance.provide(key, value),
            None => self
                .inner
                .runtime
                .warn(Warning::NoCurrentInstance { api: "provide" }),
        }
    }

    /// Inject a value into the component being set up.
    pub fn inject(&self, key: &str) -> Option<Value> {
        match self.current_instance() {
            Some(instance) => instance.inject(key),
            None => {
                self.inner
                    .runtime
                    .warn(Warning::NoCurrentInstance { api: "inject" });
                None
            }
        }
    }

    /// Look up a live instance.
    pub fn instance(&self, id: InstanceId) -> Option<Rc<ComponentInstance>> {
        self.inner.instances.borrow().get(&id).cloned()
    }

    /// Number of live component instances.
    pub fn instance_count(&self) -> usize {
        self.inner.instances.borrow().len()
    }
}

impl<H: HostOps + 'static> fmt::Debug for Renderer<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("roots", &self.inner.roots.borrow().len())
            .field("instances", &self.instance_count())
            .finish()
    }
}

/// Run an instance's render effect and surface the error it recorded.
fn run_instance_update(instance: &ComponentInstance) -> RenderResult {
    let runner = instance.update.borrow().clone();
    if let Some(runner) = runner {
        if runner.effect().is_active() {
            runner.run();
        }
    }
    let error = instance.error.borrow_mut().take();
    error.map_or(Ok(()), Err)
}

/// Symmetric prop comparison: any added, removed, or changed key. Passed
/// children always update, since slot closures are rebuilt on every
/// render.
fn should_update_component(prev: &VNode, next: &VNode) -> bool {
    if !prev.children().is_none() || !next.children().is_none() {
        return true;
    }
    let (prev_props, next_props) = (prev.props(), next.props());
    if prev_props.len() != next_props.len() {
        return true;
    }
    next_props.iter().any(|(key, value)| match prev_props.get(key) {
        Some(old) => !Value::same_value(old, value),
        None => true,
    })
}

impl<H: HostOps + 'static> RendererInner<H> {
    pub(crate) fn patch(
        self: &Rc<Self>,
        n1: Option<&VNode>,
        n2: &VNode,
        container: NodeId,
        anchor: Option<NodeId>,
        parent: Option<&Rc<ComponentInstance>>,
    ) -> RenderResult {
        let mut n1 = n1;
        let mut anchor = anchor;
        if let Some(old) = n1 {
            if old.ptr_eq(n2) {
                return Ok(());
            }
            if !is_same_vnode_type(old, n2) {
                anchor = self.next_host_node(old);
                self.unmount(old, true);
                n1 = None;
            }
        }

        match n2.ty() {
            VNodeType::Text => {
                self.process_text(n1, n2, container, anchor);
                Ok(())
            }
            VNodeType::Fragment => self.process_fragment(n1, n2, container, anchor, parent),
            VNodeType::Element(_) => match n1 {
                None => self.mount_element(n2, container, anchor, parent),
                Some(n1) => self.patch_element(n1, n2, parent),
            },
            VNodeType::Component(_) => match n1 {
                None => self.mount_component(n2, container, anchor, parent),
                Some(n1) => self.update_component(n1, n2),
            },
        }
    }

    fn process_text(&self, n1: Option<&VNode>, n2: &VNode, container: NodeId, anchor: Option<NodeId>) {
        let content = n2.text().unwrap_or_default();
        match n1 {
            None => {
                let el = self.host.create_node(HostNodeKind::Text(content));
                n2.set_el(Some(el));
                self.host.insert(el, container, anchor);
            }
            Some(n1) => {
                n2.set_el(n1.el());
                if let Some(el) = n1.el() {
                    if n1.text() != n2.text() {
                        self.host.set_text_content(el, content);
                    }
                }
            }
        }
    }

    fn process_fragment(
        self: &Rc<Self>,
        n1: Option<&VNode>,
        n2: &VNode,
        container: NodeId,
        anchor: Option<NodeId>,
        parent: Option<&Rc<ComponentInstance>>,
    ) -> RenderResult {
        match n1 {
            None => {
                let start = self.host.create_node(HostNodeKind::Text(""));
                let end = self.host.create_node(HostNodeKind::Text(""));
                n2.set_el(Some(start));
                n2.set_anchor(Some(end));
                self.host.insert(start, container, anchor);
                self.host.insert(end, container, anchor);
                self.mount_children(child_list(n2), container, Some(end), parent)
            }
            Some(n1) => {
                n2.set_el(n1.el());
                n2.set_anchor(n1.anchor());
                self.patch_keyed_children(child_list(n1), child_list(n2), container, n1.anchor(), parent)
            }
        }
    }

    fn mount_element(
        self: &Rc<Self>,
        vnode: &VNode,
        container: NodeId,
        anchor: Option<NodeId>,
        parent: Option<&Rc<ComponentInstance>>,
    ) -> RenderResult {
        let VNodeType::Element(tag) = vnode.ty() else {
            return Ok(());
        };
        let el = self.host.create_node(HostNodeKind::Element(tag));
        vnode.set_el(Some(el));

        match vnode.children() {
            Children::Text(text) => self.host.set_text_content(el, text),
            Children::List(list) => self.mount_children(list, el, None, parent)?,
            Children::None | Children::Slots(_) => {}
        }
        for (key, value) in vnode.props() {
            self.host.patch_attribute(el, key, &Value::Undefined, value);
        }
        self.host.insert(el, container, anchor);
        Ok(())
    }

    fn patch_element(
        self: &Rc<Self>,
        n1: &VNode,
        n2: &VNode,
        parent: Option<&Rc<ComponentInstance>>,
    ) -> RenderResult {
        let el = n1.el();
        n2.set_el(el);
        let Some(el) = el else {
            return Ok(());
        };
        self.patch_children(n1, n2, el, None, parent)?;
        self.patch_props(el, n1.props(), n2.props());
        Ok(())
    }

    fn patch_props(&self, el: NodeId, old: &Props, new: &Props) {
        for (key, next) in new {
            let prev = old.get(key).cloned().unwrap_or_default();
            if !Value::same_value(&prev, next) {
                self.host.patch_attribute(el, key, &prev, next);
            }
        }
        for (key, prev) in old {
            if !new.contains_key(key) {
                self.host.patch_attribute(el, key, prev, &Value::Undefined);
            }
        }
    }

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    fn mount_component(
        self: &Rc<Self>,
        vnode: &VNode,
        container: NodeId,
        anchor: Option<NodeId>,
        parent: Option<&Rc<ComponentInstance>>,
    ) -> RenderResult {
        let VNodeType::Component(def) = vnode.ty() else {
            return Ok(());
        };
        let instance = self.create_instance(vnode, def, container, parent);
        vnode.set_component(Some(instance.id));
        self.instances
            .borrow_mut()
            .insert(instance.id, Rc::clone(&instance));
        debug!(component = def.name(), id = instance.id.raw(), "mounting component");

        if let Err(err) = self.setup_component(&instance) {
            self.instances.borrow_mut().remove(&instance.id);
            vnode.set_component(None);
            return Err(err);
        }
        self.setup_render_effect(&instance, anchor)
    }

    fn create_instance(
        &self,
        vnode: &VNode,
        def: &Rc<Component>,
        container: NodeId,
        parent: Option<&Rc<ComponentInstance>>,
    ) -> Rc<ComponentInstance> {
        let props: Object = vnode
            .props()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let props_state = Reactive::new(self.runtime.clone(), props.clone(), ProxyMode::Mutable);
        let props_view = Reactive::readonly_view(self.runtime.clone(), &props_state, ProxyMode::ShallowReadonly);
        let parent_provides = match parent {
            Some(parent) => parent.provides.borrow().clone(),
            None => self.root_provides.borrow().clone(),
        };

        Rc::new(ComponentInstance {
            id: InstanceId::new(),
            def: Rc::clone(def),
            parent: parent.map(|p| p.id),
            vnode: RefCell::new(vnode.clone()),
            next: RefCell::new(None),
            props,
            props_state,
            props_view,
            slots: RefCell::new(normalize_slots(vnode.children())),
            provides: RefCell::new(Rc::clone(&parent_provides)),
            parent_provides,
            setup_state: RefCell::new(None),
            render: RefCell::new(def.render_fn().cloned()),
            sub_tree: RefCell::new(None),
            is_mounted: Cell::new(false),
            update: RefCell::new(None),
            job: RefCell::new(None),
            error: RefCell::new(None),
            container: Cell::new(container),
            runtime: self.runtime.clone(),
        })
    }

    fn setup_component(&self, instance: &Rc<ComponentInstance>) -> RenderResult {
        if let Some(setup) = instance.def.setup_fn().cloned() {
            let prev = self.current.replace(Some(Rc::clone(instance)));
            let ctx = SetupContext {
                instance: Rc::clone(instance),
            };
            let result = self.runtime.untracked(|| setup(&instance.props_view, &ctx));
            *self.current.borrow_mut() = prev;

            match result {
                SetupResult::None => {}
                SetupResult::State(state) => {
                    *instance.setup_state.borrow_mut() = Some(self.runtime.proxy_refs(state));
                }
                SetupResult::Render(render) => {
                    *instance.render.borrow_mut() = Some(render);
                }
            }
        }

        if instance.has_render() {
            Ok(())
        } else {
            Err(RenderError::MissingRenderFunction {
                component: instance.name().to_string(),
            })
        }
    }

    fn setup_render_effect(self: &Rc<Self>, instance: &Rc<ComponentInstance>, anchor: Option<NodeId>) -> RenderResult {
        let weak_renderer = Rc::downgrade(self);
        let weak_instance = Rc::downgrade(instance);
        let component_update = move || {
            let (Some(renderer), Some(instance)) = (weak_renderer.upgrade(), weak_instance.upgrade()) else {
                return Value::Undefined;
            };
            if let Err(err) = renderer.render_component(&instance, anchor) {
                *instance.error.borrow_mut() = Some(err);
            }
            Value::Undefined
        };

        let weak_runtime = self.runtime.downgrade();
        let weak_instance = Rc::downgrade(instance);
        let scheduler = move || {
            let (Some(runtime), Some(instance)) = (weak_runtime.upgrade(), weak_instance.upgrade()) else {
                return;
            };
            let job = instance.job.borrow().clone();
            if let Some(job) = job {
                runtime.queue_job(&job);
            }
        };

        let weak_instance = Rc::downgrade(instance);
        let job: Job = Rc::new(move || match weak_instance.upgrade() {
            Some(instance) => run_instance_update(&instance),
            None => Ok(()),
        });

        let runner = self.runtime.effect_with(
            component_update,
            EffectOptions::default().lazy().scheduler(scheduler),
        );
        *instance.update.borrow_mut() = Some(runner);
        *instance.job.borrow_mut() = Some(job);

        run_instance_update(instance)
    }

    /// Body of a component's render effect: first mount or re-render.
    fn render_component(self: &Rc<Self>, instance: &Rc<ComponentInstance>, mount_anchor: Option<NodeId>) -> RenderResult {
        if !instance.is_mounted.get() {
            let tree = self.render_root(instance);
            *instance.sub_tree.borrow_mut() = Some(tree.clone());
            self.patch(None, &tree, instance.container.get(), mount_anchor, Some(instance))?;
            instance.vnode.borrow().set_el(tree.el());
            instance.is_mounted.set(true);
            debug!(component = instance.name(), id = instance.id.raw(), "mounted component");
            return Ok(());
        }

        let next = instance.next.borrow_mut().take();
        if let Some(next) = &next {
            next.set_el(instance.vnode.borrow().el());
            self.update_props_and_slots(instance, next);
        }

        let next_tree = self.render_root(instance);
        let prev_tree = instance.sub_tree.borrow_mut().replace(next_tree.clone());
        // The parent may have moved us since mount.
        let container = prev_tree
            .as_ref()
            .and_then(|tree| tree.el())
            .and_then(|el| self.host.parent_node(el))
            .unwrap_or_else(|| instance.container.get());
        let anchor = prev_tree.as_ref().and_then(|tree| self.next_host_node(tree));

        self.patch(prev_tree.as_ref(), &next_tree, container, anchor, Some(instance))?;
        instance.vnode.borrow().set_el(next_tree.el());
        self.update_ancestor_els(instance, next_tree.el());
        debug!(component = instance.name(), id = instance.id.raw(), "updated component");
        Ok(())
    }

    /// A self-triggered update can change the root host node. Ancestors
    /// whose root vnode is this component share that node and must see it.
    fn update_ancestor_els(&self, instance: &Rc<ComponentInstance>, el: Option<NodeId>) {
        let mut child = Rc::clone(instance);
        loop {
            let parent = child
                .parent
                .and_then(|id| self.instances.borrow().get(&id).cloned());
            let Some(parent) = parent else {
                break;
            };
            let is_root = parent
                .sub_tree
                .borrow()
                .as_ref()
                .is_some_and(|tree| tree.ptr_eq(&child.vnode.borrow()));
            if !is_root {
                break;
            }
            parent.vnode.borrow().set_el(el);
            child = parent;
        }
    }

    fn render_root(&self, instance: &Rc<ComponentInstance>) -> VNode {
        let render = instance.render.borrow().clone();
        let ctx = RenderContext {
            instance: Rc::clone(instance),
        };
        match render {
            Some(render) => render(&ctx),
            None => fragment(()),
        }
    }

    /// Adopt a parent-provided vnode: props are updated in place so the
    /// readonly view handed to setup sees the new values.
    fn update_props_and_slots(&self, instance: &ComponentInstance, next: &VNode) {
        *instance.vnode.borrow_mut() = next.clone();
        next.set_component(Some(instance.id));

        let new_props = next.props();
        for (key, value) in new_props {
            let changed = !instance.props.contains_key(key) || !Value::same_value(&instance.props.get(key), value);
            if changed {
                instance.props_state.set_shallow(key.clone(), value.clone());
            }
        }
        for key in instance.props.keys() {
            if !new_props.contains_key(&key) {
                instance.props_state.remove(&key);
            }
        }
        *instance.slots.borrow_mut() = normalize_slots(next.children());
    }

    fn update_component(&self, n1: &VNode, n2: &VNode) -> RenderResult {
        let instance = n1
            .component()
            .and_then(|id| self.instances.borrow().get(&id).cloned());
        let Some(instance) = instance else {
            return Ok(());
        };
        n2.set_component(Some(instance.id));

        if should_update_component(n1, n2) {
            *instance.next.borrow_mut() = Some(n2.clone());
            let job = instance.job.borrow().clone();
            if let Some(job) = job {
                self.runtime.invalidate_job(&job);
            }
            run_instance_update(&instance)
        } else {
            n2.set_el(n1.el());
            *instance.vnode.borrow_mut() = n2.clone();
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Unmount and move
    // ------------------------------------------------------------------

    /// Tear down `vnode`. Host nodes are only detached when `do_remove` is
    /// set; descendants of a removed element go away with it.
    pub(crate) fn unmount(&self, vnode: &VNode, do_remove: bool) {
        match vnode.ty() {
            VNodeType::Component(_) => self.unmount_component(vnode, do_remove),
            VNodeType::Fragment => {
                for child in child_list(vnode) {
                    self.unmount(child, do_remove);
                }
                if do_remove {
                    for node in [vnode.el(), vnode.anchor()].into_iter().flatten() {
                        self.host.remove(node);
                    }
                }
            }
            VNodeType::Element(_) => {
                if let Children::List(list) = vnode.children() {
                    for child in list {
                        self.unmount(child, false);
                    }
                }
                if do_remove {
                    if let Some(el) = vnode.el() {
                        self.host.remove(el);
                    }
                }
            }
            VNodeType::Text => {
                if do_remove {
                    if let Some(el) = vnode.el() {
                        self.host.remove(el);
                    }
                }
            }
        }
    }

    fn unmount_component(&self, vnode: &VNode, do_remove: bool) {
        let Some(id) = vnode.component() else {
            return;
        };
        let instance = self.instances.borrow_mut().remove(&id);
        let Some(instance) = instance else {
            return;
        };

        if let Some(runner) = instance.update.borrow().as_ref() {
            runner.stop();
        }
        let job = instance.job.borrow_mut().take();
        if let Some(job) = job {
            self.runtime.invalidate_job(&job);
        }
        let sub_tree = instance.sub_tree.borrow_mut().take();
        if let Some(tree) = sub_tree {
            self.unmount(&tree, do_remove);
        }
        instance.is_mounted.set(false);
        debug!(component = instance.name(), id = id.raw(), "unmounted component");
    }

    /// Re-insert every host node of `vnode` before `anchor`.
    pub(crate) fn move_vnode(&self, vnode: &VNode, container: NodeId, anchor: Option<NodeId>) {
        match vnode.ty() {
            VNodeType::Component(_) => {
                let sub_tree = vnode
                    .component()
                    .and_then(|id| self.instances.borrow().get(&id).cloned())
                    .and_then(|instance| instance.sub_tree());
                if let Some(tree) = sub_tree {
                    self.move_vnode(&tree, container, anchor);
                }
            }
            VNodeType::Fragment => {
                if let Some(start) = vnode.el() {
                    self.host.insert(start, container, anchor);
                }
                for child in child_list(vnode) {
                    self.move_vnode(child, container, anchor);
                }
                if let Some(end) = vnode.anchor() {
                    self.host.insert(end, container, anchor);
                }
            }
            VNodeType::Element(_) | VNodeType::Text => {
                if let Some(el) = vnode.el() {
                    self.host.insert(el, container, anchor);
                }
            }
        }
    }

    /// The host node right after everything `vnode` rendered.
    pub(crate) fn next_host_node(&self, vnode: &VNode) -> Option<NodeId> {
        match vnode.ty() {
            VNodeType::Component(_) => {
                let sub_tree = vnode
                    .component()
                    .and_then(|id| self.instances.borrow().get(&id).cloned())
                    .and_then(|instance| instance.sub_tree())?;
                self.next_host_node(&sub_tree)
            }
            VNodeType::Fragment => self.host.next_sibling(vnode.anchor()?),
            VNodeType::Element(_) | VNodeType::Text => self.host.next_sibling(vnode.el()?),
        }
    }
}

/// Children of a fragment or element as a slice; text and slots count as
/// none.
pub(crate) fn child_list(vnode: &VNode) -> &[VNode] {
    match vnode.children() {
        Children::List(list) => list,
        _ => &[],
    }
}
