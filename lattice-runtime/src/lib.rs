//! Lattice Runtime
//!
//! This crate provides the core runtime for the Lattice reactive UI framework.
//! It implements:
//!
//! - Reactive primitives (reactive objects, refs, computed values, effects)
//! - A job scheduler that batches component updates
//! - Virtual DOM and a keyed reconciler driving a pluggable host
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: the dynamic [`Value`] model application state is made of
//! - `reactive`: dependency tracking, effects, refs and computed values
//! - `scheduler`: the pre-render job queue and microtask flush
//! - `render`: vnodes, components and the reconciler
//!
//! Everything hangs off a [`Runtime`]. Nothing is thread-safe; a runtime
//! and the values created from it live on one thread.
//!
//! # Example
//!
//! ```rust
//! use lattice_runtime::{h, props, Component, MemoryHost, Renderer, Runtime, SetupResult};
//!
//! let runtime = Runtime::new();
//! let renderer = Renderer::new(runtime.clone(), MemoryHost::new());
//! let container = renderer.host().create_container();
//!
//! let counter = Component::new("Counter")
//!     .setup(|_props, ctx| {
//!         let count = ctx.runtime().create_ref(0);
//!         SetupResult::render(move |_| {
//!             let label = format!("count: {}", count.get());
//!             h("p", props! {}, label)
//!         })
//!     })
//!     .build();
//!
//! renderer.create_app(counter).mount(container).unwrap();
//! assert_eq!(renderer.host().serialize(container), "<p>count: 0</p>");
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod render;
pub mod scheduler;
pub mod value;

pub use config::RuntimeConfig;
pub use error::{RenderError, RenderResult, Warning};
pub use reactive::{
    is_proxy, is_reactive, is_readonly, is_ref, stop, to_raw, unref, Computed, EffectOptions, ProxyMode,
    ProxyRefs, Reactive, ReactiveEffect, Ref, Runner, Runtime,
};
pub use render::{
    fragment, h, keyed_fragment, text, App, Children, Component, ComponentInstance, HostOps, MemoryHost,
    NodeId, Props, RenderContext, Renderer, SetupContext, SetupResult, VNode, VNodeType,
};
pub use scheduler::Job;
pub use value::{callback, Callback, Object, PropertyKey, Value};

/// Build [`Props`] from `key => value` pairs.
///
/// ```rust
/// use lattice_runtime::props;
///
/// let props = props! { "id" => "main", "key" => 1 };
/// assert_eq!(props.len(), 2);
/// ```
#[macro_export]
macro_rules! props {
    () => {
        $crate::render::Props::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut props = $crate::render::Props::new();
        $(
            props.insert(
                $crate::value::PropertyKey::from($key),
                $crate::value::Value::from($value),
            );
        )+
        props
    }};
}

/// Build a plain [`Object`] from `key => value` pairs.
#[macro_export]
macro_rules! object {
    () => {
        $crate::value::Object::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let object = $crate::value::Object::new();
        $(
            object.set($key, $value);
        )+
        object
    }};
}
