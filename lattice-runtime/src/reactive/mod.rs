//! Reactive Primitives
//!
//! This module implements the reactivity engine: reactive objects, refs,
//! computed values and effects, all coordinated by a [`Runtime`].
//!
//! # Concepts
//!
//! ## Reactive Objects
//!
//! [`Runtime::reactive`] wraps a plain [`Object`](crate::Object). Reading a
//! property through the wrapper inside an effect subscribes the effect to
//! that `(object, key)` pair; writing the property notifies every
//! subscriber. Readonly and shallow-readonly wrappers reject writes.
//!
//! ## Refs
//!
//! A [`Ref`] is a single reactive slot with its own subscriber set.
//!
//! ## Computed Values
//!
//! A [`Computed`] is a derived value that caches its result and is only
//! recomputed when read after one of its inputs changed.
//!
//! ## Effects
//!
//! An effect is a computation that re-runs whenever something it read
//! changes. A scheduler can defer the re-run, which is how the renderer
//! batches component updates through the job queue.
//!
//! # Implementation Notes
//!
//! Tracking is automatic: the runtime keeps a stack of running effects and
//! every reactive read consults its top entry. Nothing here is thread-safe;
//! a runtime and everything created from it live on one thread.

mod computed;
mod context;
mod effect;
mod proxy;
mod refs;
mod runtime;
mod store;
mod subscriber;

pub use computed::Computed;
pub use effect::{stop, EffectFn, EffectOptions, ReactiveEffect, Runner, SchedulerFn};
pub use proxy::{is_proxy, is_reactive, is_readonly, to_raw, ProxyMode, Reactive, IS_REACTIVE, IS_READONLY};
pub use refs::{is_ref, unref, ProxyRefs, Ref};
pub use runtime::{Runtime, WeakRuntime};
pub use subscriber::{Dep, SubscriberId};
