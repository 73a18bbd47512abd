/*
 * value.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! JSON value model used during template execution.
//!
//! The engine only needs a handful of capabilities from its data tree:
//! kind discrimination (missing / null / scalar / array / object), keyed
//! and indexed child lookup, a size query, and text rendering. [`Value`]
//! provides exactly that and is independent of `serde_json`;
//! conversion from `serde_json::Value` lives at the edge.
//!
//! Containers are reference counted so that pushing a node onto the scope
//! stack, or resolving the same subtree many times inside a loop, never
//! deep-copies data.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;
use std::sync::Arc;

static MISSING: Value = Value::Missing;

/// A node in the data tree a template is executed against.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The "no such value" sentinel. Distinct from an explicit `null`.
    #[default]
    Missing,

    /// An explicit JSON `null`.
    Null,

    /// A boolean value.
    Bool(bool),

    /// An integral number.
    Int(i64),

    /// A non-integral number.
    Float(f64),

    /// A string value.
    String(String),

    /// An ordered list of values.
    Array(Arc<Vec<Value>>),

    /// An insertion-ordered map of string keys to values.
    Object(Arc<IndexMap<String, Value>>),
}

/// Coarse classification of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Missing,
    Null,
    Scalar,
    Array,
    Object,
}

impl Value {
    /// Build an array value.
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(Arc::new(items.into_iter().collect()))
    }

    /// Build an object value, preserving the order of `entries`.
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Parse JSON text into a value.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<serde_json::Value>(text).map(Value::from)
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Missing => ValueKind::Missing,
            Value::Null => ValueKind::Null,
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_) => {
                ValueKind::Scalar
            }
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Keyed child lookup. Anything other than an object containing `key`
    /// yields the missing sentinel.
    pub fn path(&self, key: &str) -> &Value {
        match self {
            Value::Object(map) => map.get(key).unwrap_or(&MISSING),
            _ => &MISSING,
        }
    }

    /// Indexed child lookup. Anything other than an in-range array
    /// position yields the missing sentinel.
    pub fn at(&self, index: usize) -> &Value {
        match self {
            Value::Array(items) => items.get(index).unwrap_or(&MISSING),
            _ => &MISSING,
        }
    }

    /// Number of children of a container; zero for everything else.
    pub fn size(&self) -> usize {
        match self {
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            _ => 0,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integral view of a number. Floats convert only when they have no
    /// fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Check if this value is "truthy" for sections and conditionals.
    ///
    /// - Missing and null are falsy
    /// - Booleans are themselves
    /// - Numbers are truthy when non-zero
    /// - Strings are truthy when non-empty
    /// - Arrays and objects are truthy when non-empty
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Missing | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
        }
    }

    /// Render this value as template output.
    ///
    /// Missing and null render as nothing, scalars as their plain text and
    /// containers as compact JSON.
    pub fn to_text(&self) -> String {
        let mut buf = String::new();
        self.write_text(&mut buf);
        buf
    }

    /// Append the rendered text of this value to `buf`.
    pub fn write_text(&self, buf: &mut String) {
        use std::fmt::Write;
        match self {
            Value::Missing | Value::Null => {}
            Value::Bool(b) => buf.push_str(if *b { "true" } else { "false" }),
            Value::Int(n) => {
                let _ = write!(buf, "{n}");
            }
            Value::Float(f) => {
                let _ = write!(buf, "{f}");
            }
            Value::String(s) => buf.push_str(s),
            Value::Array(_) | Value::Object(_) => {
                // Serializing our own tree cannot fail: all keys are strings.
                if let Ok(json) = serde_json::to_string(self) {
                    buf.push_str(&json);
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::array(items.into_iter().map(Value::from)),
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Missing | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn json(text: &str) -> Value {
        Value::from_json_str(text).expect("valid JSON")
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Bool(false).is_truthy());

        assert!(Value::from("hello").is_truthy());
        assert!(Value::from("false").is_truthy()); // "false" string is truthy!
        assert!(!Value::from("").is_truthy());

        assert!(Value::Int(-1).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());

        assert!(json("[0]").is_truthy());
        assert!(!json("[]").is_truthy());
        assert!(json(r#"{"k": null}"#).is_truthy());
        assert!(!json("{}").is_truthy());

        assert!(!Value::Null.is_truthy());
        assert!(!Value::Missing.is_truthy());
    }

    #[test]
    fn test_child_lookup() {
        let value = json(r#"{"employee": {"salary": 50000}, "tags": ["a", "b"]}"#);

        assert_eq!(value.path("employee").path("salary"), &Value::Int(50000));
        assert_eq!(value.path("tags").at(1), &Value::from("b"));

        assert!(value.path("nonexistent").is_missing());
        assert!(value.path("tags").at(2).is_missing());
        assert!(value.path("tags").path("0").is_missing());
        assert!(value.at(0).is_missing());
    }

    #[test]
    fn test_null_is_not_missing() {
        let value = json(r#"{"a": null}"#);
        assert!(value.path("a").is_null());
        assert!(!value.path("a").is_missing());
        assert_eq!(value.path("a").kind(), ValueKind::Null);
    }

    #[test]
    fn test_size() {
        assert_eq!(json("[1, 2, 3]").size(), 3);
        assert_eq!(json(r#"{"a": 1}"#).size(), 1);
        assert_eq!(Value::from("abc").size(), 0);
        assert_eq!(Value::Missing.size(), 0);
    }

    #[test]
    fn test_to_text() {
        assert_eq!(Value::Missing.to_text(), "");
        assert_eq!(Value::Null.to_text(), "");
        assert_eq!(Value::Bool(false).to_text(), "false");
        assert_eq!(Value::Int(5).to_text(), "5");
        assert_eq!(Value::Float(1.5).to_text(), "1.5");
        assert_eq!(Value::from("x < y").to_text(), "x < y");
        assert_eq!(json(r#"{"b": [1, "two"], "a": null}"#).to_text(), r#"{"b":[1,"two"],"a":null}"#);
    }

    #[test]
    fn test_numbers_from_json() {
        assert_eq!(json("7"), Value::Int(7));
        assert_eq!(json("7.25"), Value::Float(7.25));
        assert_eq!(json("7.0").as_i64(), Some(7));
        assert_eq!(json("7.5").as_i64(), None);
    }
}
