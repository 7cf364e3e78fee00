//! The owned Value type - a detached tree of JSON-like data.
//!
//! Owned values are what connectors hand across their boundary and what the
//! template engine produces when it computes something new. Values that need
//! identity (a parent, a key, an owning item) live in the [`Heap`](crate::Heap)
//! instead; [`Heap::import`](crate::Heap::import) and
//! [`Heap::export`](crate::Heap::export) move trees between the two forms.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Number;

use crate::Fragment;

/// An opaque host value carried through the store untouched.
#[derive(Clone)]
pub struct Native(Arc<dyn Any + Send + Sync>);

impl Native {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Native(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Native({:p})", Arc::as_ptr(&self.0))
    }
}

impl PartialEq for Native {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// The variant tag of a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
    Native,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
            ValueKind::Native => "native",
        }
    }

    pub fn is_container(self) -> bool {
        matches!(self, ValueKind::Array | ValueKind::Object)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A detached tree-shaped value.
///
/// Objects keep their keys in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Native(Native),
}

impl Value {
    /// Create an empty object.
    pub fn object() -> Self {
        Value::Object(IndexMap::new())
    }

    /// Create an empty array.
    pub fn array() -> Self {
        Value::Array(Vec::new())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
            Value::Native(_) => ValueKind::Native,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_container(&self) -> bool {
        self.kind().is_container()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Look up a child by object key or array index.
    ///
    /// Returns `None` for missing keys, non-numeric array keys and
    /// non-container values.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            Value::Array(items) => items.get(key.parse::<usize>().ok()?),
            _ => None,
        }
    }

    /// Follow a fragment key by key.
    pub fn get_fragment(&self, fragment: &Fragment) -> Option<&Value> {
        let mut current = self;
        for key in fragment.iter() {
            current = current.get(key)?;
        }
        Some(current)
    }

    /// Insert into an object, returning the previous value.
    ///
    /// Does nothing and returns `None` when `self` is not an object.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        match self {
            Value::Object(map) => map.insert(key.into(), value.into()),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(v.into())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(i64::from(v).into())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Number(v.into())
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Number((v as u64).into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON form and become `Null`.
    fn from(v: f64) -> Self {
        Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
    }
}

impl From<Number> for Value {
    fn from(v: Number) -> Self {
        Value::Number(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Native> for Value {
    fn from(v: Native) -> Self {
        Value::Native(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Object(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment;

    fn sample() -> Value {
        [
            ("name", Value::from("Alice")),
            ("tags", Value::from(vec!["a", "b"])),
            ("nested", [("deep", Value::from(1))].into_iter().collect()),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn get_by_key_and_index() {
        let v = sample();
        assert_eq!(v.get("name"), Some(&Value::from("Alice")));
        assert_eq!(v.get("tags").and_then(|t| t.get("1")), Some(&Value::from("b")));
        assert_eq!(v.get("tags").and_then(|t| t.get("x")), None);
        assert_eq!(v.get("missing"), None);
    }

    #[test]
    fn get_fragment_navigates() {
        let v = sample();
        assert_eq!(
            v.get_fragment(&fragment!("nested.deep")),
            Some(&Value::from(1))
        );
        assert_eq!(v.get_fragment(&Fragment::root()), Some(&v));
        assert_eq!(v.get_fragment(&fragment!("name.x")), None);
    }

    #[test]
    fn objects_keep_insertion_order() {
        let mut v = Value::object();
        v.insert("z", 1);
        v.insert("a", 2);
        match v {
            Value::Object(map) => {
                let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                assert_eq!(keys, vec!["z", "a"]);
            }
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn non_finite_float_is_null() {
        assert_eq!(Value::from(f64::NAN), Value::Null);
        assert_eq!(Value::from(1.5).kind(), ValueKind::Number);
    }

    #[test]
    fn natives_compare_by_identity() {
        let a = Native::new(5u8);
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, Native::new(5u8));
        assert_eq!(a.downcast_ref::<u8>(), Some(&5));
    }
}
