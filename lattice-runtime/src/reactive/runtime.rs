//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects reactive objects,
//! refs, computed values and effects. It owns every piece of state that
//! would otherwise be process-global:
//!
//! - the dependency store (`target -> key -> subscribers`),
//! - the tracking stack (which effect is running, and whether it tracks),
//! - the job queue and the microtask queue,
//! - the warning log.
//!
//! # How It Works
//!
//! 1. When an effect runs, it pushes itself onto the tracking stack.
//!
//! 2. When a reactive read happens while a tracking entry is on top of the
//!    stack, the runtime records the effect in the dependency set of the
//!    key that was read, and the effect remembers the set.
//!
//! 3. When a reactive write happens, the runtime looks up the set of that
//!    key and notifies every subscriber: through its scheduler if it has
//!    one, otherwise by running it directly.
//!
//! # Isolation
//!
//! A [`Runtime`] is a cheap `Rc` handle. Independent runtimes never share
//! tracking state or queues, so several render trees can coexist on one
//! thread without interfering.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{trace, warn};

use super::computed::Computed;
use super::context::{ContextEntry, ContextGuard};
use super::effect::{EffectInner, EffectOptions, Runner};
use super::proxy::{ProxyMode, Reactive};
use super::refs::{ProxyRefs, Ref};
use super::store::DependencyStore;
use super::subscriber::Dep;
use crate::config::RuntimeConfig;
use crate::error::Warning;
use crate::scheduler::Scheduler;
use crate::value::{TargetId, Value};

pub(crate) struct RuntimeInner {
    pub(crate) config: RuntimeConfig,
    pub(crate) store: RefCell<DependencyStore>,
    pub(crate) stack: RefCell<Vec<ContextEntry>>,
    pub(crate) scheduler: Scheduler,
    warnings: RefCell<Vec<Warning>>,
}

/// Handle to an isolated reactive runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

/// Non-owning handle to a [`Runtime`].
///
/// Schedulers and other long-lived callbacks hold this instead of a
/// [`Runtime`] so they do not keep the runtime alive on their own.
#[derive(Clone)]
pub struct WeakRuntime {
    inner: Weak<RuntimeInner>,
}

impl WeakRuntime {
    /// Get the runtime back if it is still alive.
    pub fn upgrade(&self) -> Option<Runtime> {
        self.inner.upgrade().map(Runtime::from_inner)
    }
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                store: RefCell::new(DependencyStore::default()),
                stack: RefCell::new(Vec::new()),
                scheduler: Scheduler::default(),
                warnings: RefCell::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<RuntimeInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Rc<RuntimeInner> {
        &self.inner
    }

    /// The configuration this runtime was created with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Get a non-owning handle.
    pub fn downgrade(&self) -> WeakRuntime {
        WeakRuntime {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether both handles point at the same runtime.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------
    // Tracking
    // ------------------------------------------------------------------

    /// Whether a read right now would subscribe an effect.
    pub fn is_tracking(&self) -> bool {
        self.tracking_effect().is_some()
    }

    fn tracking_effect(&self) -> Option<Rc<EffectInner>> {
        let stack = self.inner.stack.borrow();
        let entry = stack.last()?;
        if entry.should_track {
            entry.effect.clone()
        } else {
            None
        }
    }

    /// Run `f` with tracking suppressed.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = ContextGuard::enter(&self.inner, None, false);
        f()
    }

    /// Record that the running effect (if any) reads `key` of `target`.
    pub fn track(&self, target: TargetId, key: &str) {
        if !self.is_tracking() {
            return;
        }
        let dep = self.inner.store.borrow_mut().dep_for(target, key);
        trace!(target = target.raw(), key, "track");
        self.track_dep(&dep);
    }

    /// Notify every effect subscribed to `key` of `target`.
    pub fn trigger(&self, target: TargetId, key: &str) {
        let dep = self.inner.store.borrow().get(target, key);
        if let Some(dep) = dep {
            trace!(target = target.raw(), key, subscribers = dep.len(), "trigger");
            self.trigger_dep(&dep);
        }
    }

    /// Subscribe the running effect to `dep`. Subscribing twice is a no-op.
    pub(crate) fn track_dep(&self, dep: &Dep) {
        let Some(effect) = self.tracking_effect() else {
            return;
        };
        if dep.insert(&effect) {
            effect.record_dep(dep.clone());
        }
    }

    /// Notify every effect in `dep`.
    ///
    /// An effect that is currently running is skipped: it is never
    /// re-entered by its own writes.
    pub(crate) fn trigger_dep(&self, dep: &Dep) {
        for effect in dep.snapshot() {
            if !effect.is_active() || effect.is_running() {
                continue;
            }
            effect.notify();
        }
    }

    /// Number of targets ever tracked in this runtime.
    pub fn tracked_target_count(&self) -> usize {
        self.inner.store.borrow().target_count()
    }

    // ------------------------------------------------------------------
    // Warnings
    // ------------------------------------------------------------------

    /// Report a policy violation. Never interrupts the caller.
    pub fn warn(&self, warning: Warning) {
        warn!("{warning}");
        if self.inner.config.record_warnings {
            self.inner.warnings.borrow_mut().push(warning);
        }
    }

    /// Drain the recorded warnings.
    pub fn take_warnings(&self) -> Vec<Warning> {
        std::mem::take(&mut *self.inner.warnings.borrow_mut())
    }

    // ------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------

    /// Wrap an object in a mutable reactive wrapper.
    ///
    /// Returns `None` and emits [`Warning::InvalidReactiveTarget`] if
    /// `target` is not an object.
    pub fn reactive(&self, target: impl Into<Value>) -> Option<Reactive> {
        self.create_proxy(target.into(), ProxyMode::Mutable)
    }

    /// Wrap an object in a deep readonly wrapper.
    ///
    /// Given a reactive wrapper instead of a raw object, the readonly view
    /// keeps tracking reads.
    pub fn readonly(&self, target: impl Into<Value>) -> Option<Reactive> {
        self.create_proxy(target.into(), ProxyMode::Readonly)
    }

    /// Wrap an object in a readonly wrapper that does not wrap nested
    /// objects.
    pub fn shallow_readonly(&self, target: impl Into<Value>) -> Option<Reactive> {
        self.create_proxy(target.into(), ProxyMode::ShallowReadonly)
    }

    fn create_proxy(&self, target: Value, mode: ProxyMode) -> Option<Reactive> {
        match target {
            Value::Object(raw) => Some(Reactive::new(self.clone(), raw, mode)),
            Value::Proxy(proxy) if mode.is_readonly() => {
                Some(Reactive::readonly_view(self.clone(), &proxy, mode))
            }
            Value::Proxy(proxy) => Some(Reactive::new(self.clone(), proxy.raw().clone(), mode)),
            other => {
                self.warn(Warning::InvalidReactiveTarget {
                    kind: other.kind_name(),
                });
                None
            }
        }
    }

    /// Create a ref holding `value`. Object values are wrapped reactively.
    pub fn create_ref(&self, value: impl Into<Value>) -> Ref {
        Ref::new(self.clone(), value.into())
    }

    /// Create a lazily evaluated derived value.
    pub fn computed<F>(&self, getter: F) -> Computed
    where
        F: Fn() -> Value + 'static,
    {
        Computed::new(self.clone(), getter)
    }

    /// Wrap an object so that ref-valued properties read and write through
    /// to the ref.
    pub fn proxy_refs(&self, target: impl Into<Value>) -> ProxyRefs {
        ProxyRefs::new(self.clone(), target.into())
    }

    /// Create an effect, run it once and return its runner.
    pub fn effect<F>(&self, f: F) -> Runner
    where
        F: Fn() -> Value + 'static,
    {
        self.effect_with(f, EffectOptions::default())
    }

    /// Create an effect with options.
    pub fn effect_with<F>(&self, f: F, options: EffectOptions) -> Runner
    where
        F: Fn() -> Value + 'static,
    {
        let lazy = options.lazy;
        let runner = Runner::new(EffectInner::new(self, Rc::new(f), options));
        if !lazy {
            runner.run();
        }
        runner
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("tracked_targets", &self.tracked_target_count())
            .field("stack_depth", &self.inner.stack.borrow().len())
            .field("pending_jobs", &self.pending_job_count())
            .finish()
    }
}
