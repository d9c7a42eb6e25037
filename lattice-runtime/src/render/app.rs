//! Application Handle
//!
//! An [`App`] binds a root component to a renderer. Values provided on the
//! app are visible to every component in the tree through `inject`.

use std::cell::Cell;
use std::rc::Rc;

use tracing::info;

use super::component::{Component, ComponentInstance, Provides};
use super::host::{HostOps, NodeId};
use super::renderer::Renderer;
use super::vnode::{h, Props, VNodeType};
use crate::error::{RenderError, RenderResult};
use crate::value::{PropertyKey, Value};

/// A root component ready to be mounted into a container.
pub struct App<H: HostOps + 'static> {
    renderer: Renderer<H>,
    root: Rc<Component>,
    props: Props,
    provides: Rc<Provides>,
    container: Cell<Option<NodeId>>,
}

impl<H: HostOps + 'static> App<H> {
    pub(crate) fn new(renderer: Renderer<H>, root: Rc<Component>) -> Self {
        Self {
            renderer,
            root,
            props: Props::new(),
            provides: Provides::root(),
            container: Cell::new(None),
        }
    }

    /// Props passed to the root component.
    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    /// Provide a value to the whole tree.
    pub fn provide(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> &Self {
        self.provides.insert(key.into(), value.into());
        self
    }

    /// Mount the root component into `container` and return its instance.
    pub fn mount(&self, container: NodeId) -> RenderResult<Option<Rc<ComponentInstance>>> {
        self.renderer
            .register_app_provides(container, Rc::clone(&self.provides));
        let vnode = h(VNodeType::Component(Rc::clone(&self.root)), self.props.clone(), ());
        self.renderer.render(vnode.clone(), container)?;
        self.container.set(Some(container));
        info!(component = self.root.name(), container = %container, "app mounted");

        Ok(vnode.component().and_then(|id| self.renderer.instance(id)))
    }

    /// Unmount the app from the container it was mounted into.
    pub fn unmount(&self) -> RenderResult {
        match self.container.take() {
            Some(container) => self.renderer.unmount_root(container),
            None => Err(RenderError::NotMounted),
        }
    }

    pub fn renderer(&self) -> &Renderer<H> {
        &self.renderer
    }

    /// The container this app is mounted into.
    pub fn container(&self) -> Option<NodeId> {
        self.container.get()
    }
}
