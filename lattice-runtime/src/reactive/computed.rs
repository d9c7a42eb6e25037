//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when read
//! after one of its inputs changed.
//!
//! # How Computed Values Work
//!
//! 1. Creation does not run the getter. The value starts dirty.
//!
//! 2. Reading a dirty computed runs the getter inside its own lazy effect,
//!    which tracks the getter's inputs, caches the result and clears the
//!    dirty flag. Reading a clean computed returns the cache.
//!
//! 3. When an input changes, the effect's scheduler only sets the dirty
//!    flag. On the clean to dirty transition it also notifies the effects
//!    that read the computed, so they re-run and pull the new value.
//!
//! Computed values that are never read never recompute.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::effect::{EffectInner, EffectOptions};
use super::runtime::Runtime;
use super::subscriber::Dep;
use crate::value::Value;

struct ComputedInner {
    effect: Rc<EffectInner>,
    dirty: Cell<bool>,
    value: RefCell<Value>,
    dep: Dep,
    runtime: Runtime,
}

impl ComputedInner {
    fn mark_dirty(&self) {
        if self.dirty.replace(true) {
            return;
        }
        self.runtime.trigger_dep(&self.dep);
    }
}

/// Lazily evaluated, cached derived value.
#[derive(Clone)]
pub struct Computed(Rc<ComputedInner>);

impl Computed {
    pub(crate) fn new<F>(runtime: Runtime, getter: F) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner>| {
            let weak = weak.clone();
            let options = EffectOptions::default().lazy().scheduler(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.mark_dirty();
                }
            });
            ComputedInner {
                effect: EffectInner::new(&runtime, Rc::new(getter), options),
                dirty: Cell::new(true),
                value: RefCell::new(Value::Undefined),
                dep: Dep::new(),
                runtime: runtime.clone(),
            }
        });
        Self(inner)
    }

    /// Read the value, recomputing if an input changed since the last read.
    /// Subscribes the running effect.
    pub fn get(&self) -> Value {
        self.0.runtime.track_dep(&self.0.dep);
        self.get_untracked()
    }

    /// Like [`get`](Self::get) without subscribing the running effect.
    pub fn get_untracked(&self) -> Value {
        if self.0.dirty.get() {
            self.0.dirty.set(false);
            let value = self.0.effect.run();
            *self.0.value.borrow_mut() = value;
        }
        self.0.value.borrow().clone()
    }

    /// Whether the next read will run the getter.
    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    /// Stop tracking inputs. The cached value stays readable and is no
    /// longer invalidated.
    pub fn stop(&self) {
        self.0.effect.stop();
    }

    pub fn ptr_eq(&self, other: &Computed) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("dirty", &self.0.dirty.get())
            .field("value", &*self.0.value.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
