//! Dynamic Value Model
//!
//! Application state handed to the runtime is dynamically shaped: plain
//! objects whose properties are read and written by key, refs holding a
//! single value, and callables used as event handlers. [`Value`] is the
//! closed set of things that can live in a property slot.
//!
//! # Identity
//!
//! Objects, refs, computed values and callbacks have reference identity.
//! [`Value::same_value`] is the structural identity check used throughout
//! the runtime: primitives compare by value (with `NaN` equal to itself and
//! `+0`/`-0` distinct), everything else compares by reference.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::reactive::{Computed, Reactive, Ref};

/// Property name inside an [`Object`].
pub type PropertyKey = Rc<str>;

/// Unique identifier for a raw object.
///
/// The dependency store is keyed by this ID rather than by address, so a
/// freed object can never alias the bookkeeping of a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

struct ObjectInner {
    id: TargetId,
    props: RefCell<IndexMap<PropertyKey, Value>>,
}

/// A raw, untracked plain object.
///
/// Cloning an `Object` clones the handle, not the properties. Reads and
/// writes on the raw object never track or trigger; wrap it with
/// [`Runtime::reactive`](crate::Runtime::reactive) for that.
#[derive(Clone)]
pub struct Object(Rc<ObjectInner>);

impl Object {
    /// Create an empty object.
    pub fn new() -> Self {
        Self(Rc::new(ObjectInner {
            id: TargetId::new(),
            props: RefCell::new(IndexMap::new()),
        }))
    }

    /// The object's identity in the dependency store.
    pub fn id(&self) -> TargetId {
        self.0.id
    }

    /// Read a property. Missing properties read as [`Value::Undefined`].
    pub fn get(&self, key: &str) -> Value {
        self.0
            .props
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    /// Write a property, returning the previous value if there was one.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> Option<Value> {
        self.0.props.borrow_mut().insert(key.into(), value.into())
    }

    /// Remove a property, keeping the order of the remaining ones.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.props.borrow_mut().shift_remove(key)
    }

    /// Whether the property exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.props.borrow().contains_key(key)
    }

    /// Property names in insertion order.
    pub fn keys(&self) -> Vec<PropertyKey> {
        self.0.props.borrow().keys().cloned().collect()
    }

    /// Snapshot of all properties in insertion order.
    pub fn entries(&self) -> Vec<(PropertyKey, Value)> {
        self.0
            .props
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.0.props.borrow().len()
    }

    /// Whether the object has no properties.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reference identity.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for Object
where
    K: Into<PropertyKey>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let object = Object::new();
        for (key, value) in iter {
            object.set(key, value);
        }
        object
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only keys: values may point back at this object.
        f.debug_struct("Object")
            .field("id", &self.0.id.raw())
            .field("keys", &self.keys())
            .finish()
    }
}

/// A callable value, used for event handlers and injection factories.
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(&[Value]) -> Value>);

impl Callback {
    /// Wrap a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        Self(Rc::new(f))
    }

    /// Invoke the callback.
    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }

    /// Reference identity.
    pub fn ptr_eq(&self, other: &Callback) -> bool {
        std::ptr::eq(
            Rc::as_ptr(&self.0) as *const (),
            Rc::as_ptr(&other.0) as *const (),
        )
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Build a [`Value::Func`] from a closure.
pub fn callback<F>(f: F) -> Value
where
    F: Fn(&[Value]) -> Value + 'static,
{
    Value::Func(Callback::new(f))
}

/// Anything that can be stored in a property slot.
#[derive(Clone, Default)]
pub enum Value {
    /// Absent value.
    #[default]
    Undefined,
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Number (always a float, like the values a template deals with).
    Number(f64),
    /// Immutable string.
    Str(Rc<str>),
    /// Raw plain object.
    Object(Object),
    /// Reactive, readonly or shallow-readonly wrapper around an object.
    Proxy(Reactive),
    /// Boxed reactive value.
    Ref(Ref),
    /// Lazily derived value.
    Computed(Computed),
    /// Callable.
    Func(Callback),
}

impl Value {
    /// Structural identity check (`Object.is` semantics).
    pub fn same_value(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => {
                if x.is_nan() && y.is_nan() {
                    true
                } else {
                    x == y && x.is_sign_negative() == y.is_sign_negative()
                }
            }
            (Value::Str(x), Value::Str(y)) => x == y,
            (Value::Object(x), Value::Object(y)) => x.ptr_eq(y),
            (Value::Proxy(x), Value::Proxy(y)) => x.ptr_eq(y),
            (Value::Ref(x), Value::Ref(y)) => x.ptr_eq(y),
            (Value::Computed(x), Value::Computed(y)) => x.ptr_eq(y),
            (Value::Func(x), Value::Func(y)) => x.ptr_eq(y),
            _ => false,
        }
    }

    /// Short name of the value's kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            Value::Proxy(_) => "proxy",
            Value::Ref(_) => "ref",
            Value::Computed(_) => "computed",
            Value::Func(_) => "function",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Reactive> {
        match self {
            Value::Proxy(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_ref_cell(&self) -> Option<&Ref> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<&Callback> {
        match self {
            Value::Func(f) => Some(f),
            _ => None,
        }
    }

    /// Call the value if it is a function; anything else yields `None`.
    pub fn call(&self, args: &[Value]) -> Option<Value> {
        self.as_func().map(|f| f.call(args))
    }

    /// Render the value as text interpolated into a template.
    ///
    /// `undefined`/`null` render as an empty string, integral numbers
    /// without a fractional part, objects as JSON.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined | Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            Value::Ref(r) => r.peek().to_display_string(),
            Value::Computed(c) => c.get_untracked().to_display_string(),
            Value::Func(_) => "[function]".to_string(),
            Value::Object(_) | Value::Proxy(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }

    /// Convert parsed JSON into runtime values.
    ///
    /// Arrays become objects keyed by decimal index, since only plain
    /// objects can be made reactive.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s.into()),
            serde_json::Value::Array(items) => Value::Object(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), Value::from_json(v)))
                    .collect(),
            ),
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{sign}Infinity")
    } else if n.fract() == 0.0 && n.abs() < 9.2e18 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        Value::same_value(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Object(o) => o.fmt(f),
            Value::Proxy(p) => p.fmt(f),
            Value::Ref(r) => r.fmt(f),
            Value::Computed(c) => c.fmt(f),
            Value::Func(c) => c.fmt(f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null | Value::Func(_) => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::Str(s) => serializer.serialize_str(s),
            Value::Object(o) => serialize_object(o, serializer),
            Value::Proxy(p) => serialize_object(p.raw(), serializer),
            Value::Ref(r) => r.peek().serialize(serializer),
            Value::Computed(c) => c.get_untracked().serialize(serializer),
        }
    }
}

fn serialize_object<S: Serializer>(object: &Object, serializer: S) -> Result<S::Ok, S::Error> {
    let entries = object.entries();
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (key, value) in &entries {
        map.serialize_entry(&**key, value)?;
    }
    map.end()
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Reactive> for Value {
    fn from(p: Reactive) -> Self {
        Value::Proxy(p)
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Ref(r)
    }
}

impl From<Computed> for Value {
    fn from(c: Computed) -> Self {
        Value::Computed(c)
    }
}

impl From<Callback> for Value {
    fn from(c: Callback) -> Self {
        Value::Func(c)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_value_follows_object_is() {
        assert!(Value::same_value(&Value::from(f64::NAN), &Value::from(f64::NAN)));
        assert!(!Value::same_value(&Value::from(0.0), &Value::from(-0.0)));
        assert!(Value::same_value(&Value::from("a"), &Value::from("a")));
        assert!(!Value::same_value(&Value::from(1), &Value::from("1")));

        let a = Object::new();
        let b = Object::new();
        assert!(Value::same_value(&a.clone().into(), &a.into()));
        assert!(!Value::same_value(&Value::from(b.clone()), &Value::from(Object::new())));
    }

    #[test]
    fn object_keeps_insertion_order() {
        let object: Object = [("b", 1), ("a", 2), ("c", 3)].into_iter().collect();
        let keys: Vec<String> = object.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["b", "a", "c"]);

        object.remove("a");
        let keys: Vec<String> = object.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["b", "c"]);
    }

    #[test]
    fn object_ids_are_unique() {
        assert_ne!(Object::new().id(), Object::new().id());
    }

    #[test]
    fn display_strings() {
        assert_eq!(Value::Undefined.to_display_string(), "");
        assert_eq!(Value::from(3.0).to_display_string(), "3");
        assert_eq!(Value::from(1.5).to_display_string(), "1.5");
        assert_eq!(Value::from(true).to_display_string(), "true");

        let object: Object = [("n", Value::from(1)), ("s", Value::from("x"))]
            .into_iter()
            .collect();
        assert_eq!(Value::from(object).to_display_string(), r#"{"n":1,"s":"x"}"#);
    }

    #[test]
    fn large_whole_numbers_display_exactly() {
        assert_eq!(Value::from(-42.0).to_display_string(), "-42");
        assert_eq!(Value::from(9.0e18).to_display_string(), "9000000000000000000");
        assert_eq!(Value::from(1e20).to_display_string(), "100000000000000000000");
        assert_eq!(Value::from(-1e20).to_display_string(), "-100000000000000000000");
    }

    #[test]
    fn from_json_builds_nested_objects() {
        let value = Value::from_json(serde_json::json!({
            "user": { "name": "ada", "tags": ["a", "b"] }
        }));
        let user = value.as_object().unwrap().get("user");
        let user = user.as_object().unwrap();
        assert_eq!(user.get("name"), Value::from("ada"));
        let tags = user.get("tags");
        assert_eq!(tags.as_object().unwrap().get("1"), Value::from("b"));
    }

    #[test]
    fn callback_identity_and_call() {
        let f = Callback::new(|args| Value::from(args.len()));
        let g = f.clone();
        assert!(f.ptr_eq(&g));
        assert!(!f.ptr_eq(&Callback::new(|_| Value::Undefined)));
        assert_eq!(f.call(&[Value::Null, Value::Null]), Value::from(2));
    }
}
