//! Reactive Wrappers
//!
//! A [`Reactive`] is a view over a raw [`Object`] that intercepts property
//! access. Three access modes exist:
//!
//! | Mode               | Reads track | Writes             | Nested objects      |
//! |--------------------|-------------|--------------------|---------------------|
//! | `Mutable`          | yes         | mutate + trigger   | wrapped `Mutable`   |
//! | `Readonly`         | no*         | warn, no-op        | wrapped `Readonly`  |
//! | `ShallowReadonly`  | no*         | warn, no-op        | returned raw        |
//!
//! \* see below.
//!
//! Wrappers never copy the underlying object: two wrappers over the same
//! raw object observe each other's writes, and the raw object itself can
//! still be mutated (untracked) through [`Reactive::raw`].
//!
//! A readonly view created from a tracking wrapper (rather than from a raw
//! object) keeps tracking reads, so code holding only the readonly view
//! still reacts to writes made through the mutable one. Component props
//! are exposed this way.
//!
//! The keys [`IS_REACTIVE`] and [`IS_READONLY`] are answered structurally
//! from the wrapper's mode and are never stored on the raw object.

use std::fmt;

use super::runtime::Runtime;
use crate::error::Warning;
use crate::value::{Object, PropertyKey, Value};

/// Introspection key: reads `true` through a mutable wrapper.
pub const IS_REACTIVE: &str = "__v_isReactive";

/// Introspection key: reads `true` through a readonly wrapper.
pub const IS_READONLY: &str = "__v_isReadonly";

/// Pseudo key tracked by key enumeration and triggered when keys are added
/// or removed.
pub(crate) const ITERATE_KEY: &str = "__v_iterate";

/// Access mode of a [`Reactive`] wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyMode {
    /// Reads track, writes trigger.
    Mutable,
    /// Reads do not track, writes are rejected, nested objects are wrapped
    /// readonly.
    Readonly,
    /// Like `Readonly` but nested objects are returned as-is.
    ShallowReadonly,
}

impl ProxyMode {
    /// Whether writes are rejected.
    pub fn is_readonly(self) -> bool {
        !matches!(self, ProxyMode::Mutable)
    }

    /// Whether nested objects are wrapped on read.
    pub fn is_deep(self) -> bool {
        !matches!(self, ProxyMode::ShallowReadonly)
    }
}

/// Reactive view over a raw object.
#[derive(Clone)]
pub struct Reactive {
    raw: Object,
    mode: ProxyMode,
    tracks: bool,
    runtime: Runtime,
}

impl Reactive {
    pub(crate) fn new(runtime: Runtime, raw: Object, mode: ProxyMode) -> Self {
        let tracks = !mode.is_readonly();
        Self {
            raw,
            mode,
            tracks,
            runtime,
        }
    }

    /// Readonly view over a tracking wrapper: reads keep tracking.
    pub(crate) fn readonly_view(runtime: Runtime, source: &Reactive, mode: ProxyMode) -> Self {
        Self {
            raw: source.raw.clone(),
            mode,
            tracks: source.tracks,
            runtime,
        }
    }

    fn wrap_nested(&self, raw: Object) -> Reactive {
        Self {
            raw,
            mode: self.mode,
            tracks: self.tracks,
            runtime: self.runtime.clone(),
        }
    }

    /// Read a property.
    pub fn get(&self, key: &str) -> Value {
        match key {
            IS_REACTIVE => return Value::Bool(self.tracks),
            IS_READONLY => return Value::Bool(self.mode.is_readonly()),
            _ => {}
        }

        if self.tracks {
            self.runtime.track(self.raw.id(), key);
        }

        let value = self.raw.get(key);
        if !self.mode.is_deep() {
            return value;
        }
        match value {
            Value::Object(nested) => Value::Proxy(self.wrap_nested(nested)),
            other => other,
        }
    }

    /// Write a property.
    ///
    /// Returns `false` (after emitting [`Warning::ReadonlyMutation`]) if the
    /// wrapper is readonly. Wrapped objects are stored raw.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> bool {
        let key = key.into();
        if self.mode.is_readonly() {
            self.runtime.warn(Warning::ReadonlyMutation {
                key: key.to_string(),
            });
            return false;
        }

        let value = match value.into() {
            Value::Proxy(proxy) => Value::Object(proxy.raw),
            other => other,
        };
        let added = self.raw.set(key.clone(), value).is_none();

        self.runtime.trigger(self.raw.id(), &key);
        if added {
            self.runtime.trigger(self.raw.id(), ITERATE_KEY);
        }
        true
    }

    /// Store `value` as given, wrappers included, and trigger. Component
    /// props are shallow and are written this way.
    pub(crate) fn set_shallow(&self, key: PropertyKey, value: Value) {
        let added = self.raw.set(key.clone(), value).is_none();
        self.runtime.trigger(self.raw.id(), &key);
        if added {
            self.runtime.trigger(self.raw.id(), ITERATE_KEY);
        }
    }

    /// Delete a property. Deleting through a readonly wrapper warns.
    pub fn remove(&self, key: &str) -> bool {
        if self.mode.is_readonly() {
            self.runtime.warn(Warning::ReadonlyMutation {
                key: key.to_string(),
            });
            return false;
        }
        if self.raw.remove(key).is_none() {
            return false;
        }
        self.runtime.trigger(self.raw.id(), key);
        self.runtime.trigger(self.raw.id(), ITERATE_KEY);
        true
    }

    /// Whether the property exists. Tracks the key like a read.
    pub fn has(&self, key: &str) -> bool {
        if self.tracks {
            self.runtime.track(self.raw.id(), key);
        }
        self.raw.contains_key(key)
    }

    /// Enumerate property keys. Tracks additions and removals.
    pub fn keys(&self) -> Vec<PropertyKey> {
        if self.tracks {
            self.runtime.track(self.raw.id(), ITERATE_KEY);
        }
        self.raw.keys()
    }

    /// The wrapped object.
    pub fn raw(&self) -> &Object {
        &self.raw
    }

    /// Access mode.
    pub fn mode(&self) -> ProxyMode {
        self.mode
    }

    /// Whether reads through this wrapper are tracked.
    pub fn is_reactive(&self) -> bool {
        self.tracks
    }

    pub fn is_readonly(&self) -> bool {
        self.mode.is_readonly()
    }

    /// Whether both wrappers view the same object the same way.
    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        self.mode == other.mode && self.tracks == other.tracks && self.raw.ptr_eq(&other.raw)
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("mode", &self.mode)
            .field("tracks", &self.tracks)
            .field("raw", &self.raw)
            .finish()
    }
}

/// Whether `value` is a wrapper whose reads are tracked.
pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Proxy(p) if p.is_reactive())
}

/// Whether `value` is a readonly or shallow-readonly wrapper.
pub fn is_readonly(value: &Value) -> bool {
    matches!(value, Value::Proxy(p) if p.is_readonly())
}

/// Whether `value` is any kind of wrapper.
pub fn is_proxy(value: &Value) -> bool {
    matches!(value, Value::Proxy(_))
}

/// Strip a wrapper, returning the raw object. Other values pass through.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Proxy(p) => Value::Object(p.raw.clone()),
        other => other.clone(),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
