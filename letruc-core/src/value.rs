//! Dynamic Values
//!
//! Component properties are dynamically typed, the same way element
//! properties are in a browser. [`Value`] is that dynamic type; effect
//! factories convert it into what they need through [`FromValue`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// A dynamically typed property value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Structured data (arrays and objects).
    Json(serde_json::Value),
}

/// The kind of a [`Value`], used to validate writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Json,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Json => "object",
        })
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) | Value::Float(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Json(_) => ValueKind::Json,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Json(serde_json::Value::Null))
    }

    /// JS-like truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Json(json) => !json.is_null(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(n) if n.fract() == 0.0 => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Json(json) => Some(json),
            _ => None,
        }
    }

    /// Attribute representation: `None` removes the attribute.
    pub fn to_attribute(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) if n.fract() == 0.0 && fits_i64(*n) => write!(f, "{}", *n as i64),
            Value::Float(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Json(json) => write!(f, "{json}"),
        }
    }
}

fn fits_i64(n: f64) -> bool {
    n >= i64::MIN as f64 && n < -(i64::MIN as f64)
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
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

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
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
            other => Value::Json(other),
        }
    }
}

/// Lossy, JS-like conversion out of a [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Self;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Self {
        value
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Self {
        value.to_string()
    }
}

impl FromValue for Option<String> {
    fn from_value(value: Value) -> Self {
        value.to_attribute()
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Self {
        value.is_truthy()
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Self {
        match value {
            Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
            Value::Bool(b) => f64::from(u8::from(b)),
            other => other.as_f64().unwrap_or(f64::NAN),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Self {
        match value {
            Value::String(s) => s.trim().parse().unwrap_or_default(),
            Value::Bool(b) => i64::from(b),
            Value::Float(n) => n.trunc() as i64,
            other => other.as_i64().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_share_a_kind() {
        assert_eq!(Value::Int(1).kind(), Value::Float(1.5).kind());
        assert_ne!(Value::Int(1).kind(), Value::from("1").kind());
    }

    #[test]
    fn display_matches_attribute_text() {
        assert_eq!(Value::Int(6).to_string(), "6");
        assert_eq!(Value::Float(2.0).to_string(), "2");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Float(1e20).to_string(), "100000000000000000000");
        assert_eq!(Value::Float(-1e20).to_attribute().as_deref(), Some("-100000000000000000000"));
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Null.to_attribute(), None);
    }

    #[test]
    fn json_numbers_become_numbers() {
        assert_eq!(Value::from(serde_json::json!(3)), Value::Int(3));
        assert_eq!(Value::from(serde_json::json!(0.5)), Value::Float(0.5));
        assert!(matches!(Value::from(serde_json::json!([1, 2])), Value::Json(_)));
    }

    #[test]
    fn conversions_follow_truthiness() {
        assert!(bool::from_value(Value::from("x")));
        assert!(!bool::from_value(Value::from("")));
        assert!(!bool::from_value(Value::Int(0)));
        assert_eq!(i64::from_value(Value::from(" 42 ")), 42);
        assert_eq!(Option::<String>::from_value(Value::Null), None);
    }
}
