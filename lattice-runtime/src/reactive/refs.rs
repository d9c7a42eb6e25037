//! Refs
//!
//! A [`Ref`] is a single boxed reactive value with its own subscriber set.
//! Reading it subscribes the running effect; writing a value that differs
//! from the current one (by [`Value::same_value`]) notifies subscribers.
//! Writing an equal value is a no-op.
//!
//! Object values are stored wrapped in a mutable [`Reactive`], so nested
//! writes through the ref's value are tracked too.
//!
//! [`ProxyRefs`] is the view used to expose setup state to render
//! functions: ref-valued properties read as their current value and
//! assignments to them write through to the ref.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::proxy::{to_raw, ProxyMode, Reactive};
use super::runtime::Runtime;
use super::subscriber::Dep;
use crate::error::Warning;
use crate::value::{PropertyKey, Value};

struct RefInner {
    raw: RefCell<Value>,
    value: RefCell<Value>,
    dep: Dep,
    runtime: Runtime,
}

/// Boxed reactive value.
#[derive(Clone)]
pub struct Ref(Rc<RefInner>);

fn to_reactive(runtime: &Runtime, value: Value) -> Value {
    match value {
        Value::Object(raw) => Value::Proxy(Reactive::new(runtime.clone(), raw, ProxyMode::Mutable)),
        other => other,
    }
}

impl Ref {
    pub(crate) fn new(runtime: Runtime, value: Value) -> Self {
        let raw = to_raw(&value);
        let value = to_reactive(&runtime, value);
        Self(Rc::new(RefInner {
            raw: RefCell::new(raw),
            value: RefCell::new(value),
            dep: Dep::new(),
            runtime,
        }))
    }

    /// Read the value, subscribing the running effect.
    pub fn get(&self) -> Value {
        self.0.runtime.track_dep(&self.0.dep);
        self.peek()
    }

    /// Read the value without tracking.
    pub fn peek(&self) -> Value {
        self.0.value.borrow().clone()
    }

    /// Replace the value. Returns `false` if it was equal and nothing
    /// happened.
    pub fn set(&self, value: impl Into<Value>) -> bool {
        let value = value.into();
        let new_raw = to_raw(&value);
        if Value::same_value(&self.0.raw.borrow(), &new_raw) {
            return false;
        }

        *self.0.raw.borrow_mut() = new_raw;
        *self.0.value.borrow_mut() = to_reactive(&self.0.runtime, value);
        self.0.runtime.trigger_dep(&self.0.dep);
        true
    }

    /// Compute the next value from the current one (untracked) and set it.
    pub fn update(&self, f: impl FnOnce(&Value) -> Value) -> bool {
        let next = f(&self.peek());
        self.set(next)
    }

    pub fn ptr_eq(&self, other: &Ref) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of effects currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        self.0.dep.len()
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("value", &*self.0.value.borrow())
            .field("subscribers", &self.0.dep.len())
            .finish()
    }
}

/// Whether `value` is a ref (computed values count as refs).
pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_) | Value::Computed(_))
}

/// Resolve a ref to its current value; other values pass through.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(r) => r.get(),
        Value::Computed(c) => c.get(),
        other => other.clone(),
    }
}

/// View over an object whose ref-valued properties are transparently
/// unwrapped.
#[derive(Clone, Debug)]
pub struct ProxyRefs {
    target: Value,
    runtime: Runtime,
}

impl ProxyRefs {
    pub(crate) fn new(runtime: Runtime, target: Value) -> Self {
        Self { target, runtime }
    }

    fn raw_get(&self, key: &str) -> Value {
        match &self.target {
            Value::Proxy(p) => p.get(key),
            Value::Object(o) => o.get(key),
            _ => Value::Undefined,
        }
    }

    /// Read a property, unwrapping refs.
    pub fn get(&self, key: &str) -> Value {
        unref(&self.raw_get(key))
    }

    /// Write a property.
    ///
    /// If the slot holds a ref and `value` is not a ref, the ref's value is
    /// replaced instead of the slot. A computed slot cannot be written.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let value = value.into();
        let old = match &self.target {
            Value::Proxy(p) => p.raw().get(&key),
            Value::Object(o) => o.get(&key),
            _ => return false,
        };

        if !is_ref(&value) {
            match old {
                Value::Ref(r) => {
                    r.set(value);
                    return true;
                }
                Value::Computed(_) => {
                    self.runtime.warn(Warning::ReadonlyMutation {
                        key: key.to_string(),
                    });
                    return false;
                }
                _ => {}
            }
        }

        match &self.target {
            Value::Proxy(p) => p.set(key, value),
            Value::Object(o) => {
                o.set(key, value);
                true
            }
            _ => false,
        }
    }

    /// Whether the property exists.
    pub fn has(&self, key: &str) -> bool {
        match &self.target {
            Value::Proxy(p) => p.has(key),
            Value::Object(o) => o.contains_key(key),
            _ => false,
        }
    }

    /// The wrapped object.
    pub fn target(&self) -> &Value {
        &self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Object;
    use std::cell::Cell;

    #[test]
    fn ref_tracks_and_triggers() {
        let rt = Runtime::new();
        let count = rt.create_ref(1);
        let seen = Rc::new(Cell::new(0.0));

        let count_inner = count.clone();
        let seen_inner = seen.clone();
        let _runner = rt.effect(move || {
            seen_inner.set(count_inner.get().as_number().unwrap());
            Value::Undefined
        });

        assert_eq!(seen.get(), 1.0);
        assert_eq!(count.subscriber_count(), 1);

        count.set(2);
        assert_eq!(seen.get(), 2.0);
    }

    #[test]
    fn setting_an_equal_value_does_not_trigger() {
        let rt = Runtime::new();
        let count = rt.create_ref(1);
        let runs = Rc::new(Cell::new(0));

        let count_inner = count.clone();
        let runs_inner = runs.clone();
        let _runner = rt.effect(move || {
            runs_inner.set(runs_inner.get() + 1);
            count_inner.get()
        });

        assert!(!count.set(1));
        assert_eq!(runs.get(), 1);

        let nan = rt.create_ref(f64::NAN);
        assert!(!nan.set(f64::NAN));
    }

    #[test]
    fn object_values_are_wrapped() {
        let rt = Runtime::new();
        let raw = Object::from_iter([("n", 1)]);
        let r = rt.create_ref(raw.clone());

        let value = r.peek();
        let proxy = value.as_proxy().unwrap();
        assert!(proxy.raw().ptr_eq(&raw));

        // Setting the raw object again or its wrapper is not a change.
        assert!(!r.set(raw.clone()));
        assert!(!r.set(value.clone()));
    }

    #[test]
    fn update_uses_current_value() {
        let rt = Runtime::new();
        let count = rt.create_ref(1);
        count.update(|v| Value::from(v.as_number().unwrap() + 1.0));
        assert_eq!(count.peek(), Value::from(2));
    }

    #[test]
    fn unref_passes_through_plain_values() {
        let rt = Runtime::new();
        assert_eq!(unref(&Value::from(1)), Value::from(1));
        assert_eq!(unref(&Value::Ref(rt.create_ref("a"))), Value::from("a"));
        assert!(is_ref(&Value::Ref(rt.create_ref(0))));
        assert!(!is_ref(&Value::Null));
    }

    #[test]
    fn proxy_refs_unwrap_and_write_through() {
        let rt = Runtime::new();
        let count = rt.create_ref(1);
        let state = Object::from_iter([("count", Value::from(count.clone())), ("plain", Value::from(2))]);
        let view = rt.proxy_refs(state.clone());

        assert_eq!(view.get("count"), Value::from(1));
        assert_eq!(view.get("plain"), Value::from(2));

        // Writes through to the ref; the slot keeps the same ref.
        assert!(view.set("count", 5));
        assert_eq!(count.peek(), Value::from(5));
        assert!(state.get("count").as_ref_cell().unwrap().ptr_eq(&count));

        // A ref replaces the slot.
        let other = rt.create_ref(9);
        view.set("count", other.clone());
        assert_eq!(view.get("count"), Value::from(9));
        assert_eq!(count.peek(), Value::from(5));

        view.set("plain", 3);
        assert_eq!(state.get("plain"), Value::from(3));
    }

    #[test]
    fn proxy_refs_refuse_computed_slots() {
        let rt = Runtime::new();
        let double = rt.computed(|| Value::from(2));
        let state = Object::from_iter([("double", Value::from(double))]);
        let view = rt.proxy_refs(state);

        assert!(!view.set("double", 3));
        assert_eq!(view.get("double"), Value::from(2));
        assert_eq!(
            rt.take_warnings(),
            vec![Warning::ReadonlyMutation { key: "double".into() }]
        );
    }
}
