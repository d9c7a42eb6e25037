//! Effect Implementation
//!
//! An Effect wraps a computation and re-runs it whenever a reactive value it
//! read changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately (unless it is
//!    lazy) to establish its initial dependencies.
//!
//! 2. Before every tracked run the effect leaves all dependency sets it had
//!    joined, then re-joins the ones it reads during the run. Branches that
//!    are no longer taken stop notifying it.
//!
//! 3. When a dependency changes, the effect either calls its scheduler (if
//!    one was given) or runs again directly.
//!
//! # Stopping
//!
//! [`stop`] detaches the effect from the dependency graph and calls its
//! `on_stop` callback once. A stopped effect can still be run manually
//! through its [`Runner`]: the computation executes, but no reads are
//! tracked.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::debug;

use super::context::ContextGuard;
use super::runtime::{Runtime, RuntimeInner};
use super::subscriber::{Dep, SubscriberId};
use crate::value::Value;

/// The computation wrapped by an effect.
pub type EffectFn = Rc<dyn Fn() -> Value>;

/// Called instead of re-running the effect when a dependency changes.
pub type SchedulerFn = Rc<dyn Fn()>;

/// Options accepted by [`Runtime::effect_with`].
#[derive(Default)]
pub struct EffectOptions {
    /// Alternate reaction to a trigger, replacing the immediate re-run.
    pub scheduler: Option<SchedulerFn>,
    /// Called once when the effect is stopped.
    pub on_stop: Option<Box<dyn FnOnce()>>,
    /// Do not run the effect on creation.
    pub lazy: bool,
}

impl EffectOptions {
    /// Set the scheduler.
    pub fn scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn() + 'static,
    {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    /// Set the stop callback.
    pub fn on_stop<F>(mut self, on_stop: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        self.on_stop = Some(Box::new(on_stop));
        self
    }

    /// Skip the initial run.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }
}

pub(crate) struct EffectInner {
    id: SubscriberId,
    runtime: Weak<RuntimeInner>,
    func: EffectFn,
    active: Cell<bool>,
    running: Cell<bool>,
    deps: RefCell<SmallVec<[Dep; 4]>>,
    scheduler: Option<SchedulerFn>,
    on_stop: RefCell<Option<Box<dyn FnOnce()>>>,
    run_count: Cell<usize>,
}

/// Clears the running flag even if the computation panics.
struct RunningGuard<'a>(&'a Cell<bool>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl EffectInner {
    pub(crate) fn new(runtime: &Runtime, func: EffectFn, options: EffectOptions) -> Rc<Self> {
        Rc::new(Self {
            id: SubscriberId::new(),
            runtime: Rc::downgrade(runtime.inner()),
            func,
            active: Cell::new(true),
            running: Cell::new(false),
            deps: RefCell::new(SmallVec::new()),
            scheduler: options.scheduler,
            on_stop: RefCell::new(options.on_stop),
            run_count: Cell::new(0),
        })
    }

    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.get()
    }

    pub(crate) fn record_dep(&self, dep: Dep) {
        self.deps.borrow_mut().push(dep);
    }

    /// Run the computation.
    ///
    /// Active effects track their reads; stopped effects run untracked. An
    /// effect that is already running is not re-entered.
    pub(crate) fn run(self: &Rc<Self>) -> Value {
        if self.running.get() {
            return Value::Undefined;
        }
        self.running.set(true);
        let _running = RunningGuard(&self.running);
        self.run_count.set(self.run_count.get() + 1);

        let Some(runtime) = self.runtime.upgrade() else {
            return (self.func)();
        };

        let should_track = self.active.get();
        if should_track {
            self.cleanup();
        }
        let _ctx = ContextGuard::enter(&runtime, Some(Rc::clone(self)), should_track);
        (self.func)()
    }

    /// React to a trigger.
    pub(crate) fn notify(self: &Rc<Self>) {
        match &self.scheduler {
            Some(scheduler) => scheduler(),
            None => {
                self.run();
            }
        }
    }

    /// Leave every dependency set this effect joined.
    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in deps {
            dep.remove(self.id);
        }
    }

    pub(crate) fn stop(&self) {
        if !self.active.get() {
            return;
        }
        self.cleanup();
        self.active.set(false);
        debug!(effect = ?self.id, "effect stopped");

        let on_stop = self.on_stop.borrow_mut().take();
        if let Some(on_stop) = on_stop {
            on_stop();
        }
    }
}

/// Handle to an effect.
///
/// Clones share the same underlying effect.
#[derive(Clone)]
pub struct ReactiveEffect {
    inner: Rc<EffectInner>,
}

impl ReactiveEffect {
    /// The effect's subscriber ID.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Whether the effect still reacts to triggers.
    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    /// Whether the computation is executing right now.
    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// Run the computation (see [`Runner::run`]).
    pub fn run(&self) -> Value {
        self.inner.run()
    }

    /// Detach from every dependency set and call `on_stop` once.
    /// Stopping an already stopped effect does nothing.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Number of times the computation has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Number of dependency sets the effect currently belongs to.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }
}

impl fmt::Debug for ReactiveEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.inner.id)
            .field("active", &self.is_active())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// Callable handle returned by [`Runtime::effect`].
///
/// Running it re-invokes the computation and re-establishes tracking.
#[derive(Clone, Debug)]
pub struct Runner {
    effect: ReactiveEffect,
}

impl Runner {
    pub(crate) fn new(inner: Rc<EffectInner>) -> Self {
        Self {
            effect: ReactiveEffect { inner },
        }
    }

    /// Run the computation and return its result.
    pub fn run(&self) -> Value {
        self.effect.run()
    }

    /// The effect behind this runner.
    pub fn effect(&self) -> &ReactiveEffect {
        &self.effect
    }

    /// Shorthand for [`stop`].
    pub fn stop(&self) {
        self.effect.stop();
    }
}

/// Stop the effect behind `runner`.
pub fn stop(runner: &Runner) {
    runner.stop();
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
