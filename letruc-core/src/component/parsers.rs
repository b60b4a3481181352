//! Attribute Parsers
//!
//! A parser turns an attribute string (or its absence) into a property
//! value. It also receives the component's [`Ui`] and the property's
//! previous value, for parsers that need either.

use std::rc::Rc;

use super::ui::Ui;
use crate::value::Value;

/// `(ui, attribute, previous) -> value`
pub type Parser = Rc<dyn Fn(&Ui, Option<&str>, Option<&Value>) -> Value>;

/// Wrap a closure as a [`Parser`].
pub fn parser(f: impl Fn(&Ui, Option<&str>, Option<&Value>) -> Value + 'static) -> Parser {
    Rc::new(f)
}

/// Present and not `"false"` means true.
pub fn as_boolean() -> Parser {
    parser(|_, attr, _| Value::Bool(attr.is_some_and(|v| v != "false")))
}

/// Decimal or `0x` hexadecimal integers. Decimal fractions are truncated.
/// Anything else yields `fallback`.
pub fn as_integer(fallback: i64) -> Parser {
    parser(move |_, attr, _| {
        let Some(attr) = attr else {
            return Value::Int(fallback);
        };
        match parse_integer(attr) {
            Some(n) => Value::Int(n),
            None => {
                tracing::warn!(value = attr, fallback, "attribute is not an integer");
                Value::Int(fallback)
            }
        }
    })
}

fn parse_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if digits.starts_with(['+', '-']) {
        return None;
    }
    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        if hex.starts_with(['+', '-']) {
            return None;
        }
        let magnitude = i64::from_str_radix(hex, 16).ok()?;
        return if negative {
            magnitude.checked_neg()
        } else {
            Some(magnitude)
        };
    }
    let n: f64 = digits.parse().ok()?;
    let n = if negative { -n } else { n }.trunc();
    // i64::MIN is exact as f64, i64::MAX is not
    if !n.is_finite() || n < i64::MIN as f64 || n >= -(i64::MIN as f64) {
        return None;
    }
    Some(n as i64)
}

/// Finite numbers. Anything else yields `fallback`.
pub fn as_number(fallback: f64) -> Parser {
    parser(move |_, attr, _| {
        let parsed = attr.and_then(|a| a.trim().parse::<f64>().ok().filter(|n| n.is_finite()));
        match (attr, parsed) {
            (_, Some(n)) => Value::Float(n),
            (Some(attr), None) => {
                tracing::warn!(value = attr, fallback, "attribute is not a number");
                Value::Float(fallback)
            }
            (None, None) => Value::Float(fallback),
        }
    })
}

/// The attribute text, or `fallback` when absent.
pub fn as_string(fallback: &str) -> Parser {
    let fallback = fallback.to_string();
    parser(move |_, attr, _| Value::String(attr.map_or_else(|| fallback.clone(), str::to_string)))
}

/// One of `allowed`, compared case-insensitively. Unknown or absent values
/// yield the first allowed value.
pub fn as_enum(allowed: &[&str]) -> Parser {
    let allowed: Vec<String> = allowed.iter().map(|s| s.to_string()).collect();
    parser(move |_, attr, _| {
        let matched = attr.and_then(|attr| {
            allowed
                .iter()
                .find(|candidate| candidate.eq_ignore_ascii_case(attr.trim()))
        });
        matched
            .or_else(|| allowed.first())
            .map_or(Value::Null, |v| Value::String(v.clone()))
    })
}

/// JSON text. Invalid JSON yields `fallback`.
pub fn as_json(fallback: serde_json::Value) -> Parser {
    parser(move |_, attr, _| {
        let Some(attr) = attr else {
            return Value::from(fallback.clone());
        };
        match serde_json::from_str::<serde_json::Value>(attr) {
            Ok(json) => Value::from(json),
            Err(error) => {
                tracing::warn!(%error, "attribute is not valid JSON");
                Value::from(fallback.clone())
            }
        }
    })
}

/// Parse an attribute by the kind of `initial`, used for plain-value
/// properties.
pub(crate) fn parse_like(initial: &Value, attr: &str) -> Value {
    match initial {
        Value::Bool(_) => Value::Bool(attr != "false"),
        Value::Int(n) => Value::Int(parse_integer(attr).unwrap_or(*n)),
        Value::Float(n) => Value::Float(attr.trim().parse().unwrap_or(*n)),
        Value::Json(json) => serde_json::from_str::<serde_json::Value>(attr)
            .map(Value::from)
            .unwrap_or_else(|_| Value::Json(json.clone())),
        Value::Null | Value::String(_) => Value::String(attr.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ui::Queries;
    use crate::dom::Element;
    use serde_json::json;

    fn run(p: &Parser, attr: Option<&str>) -> Value {
        let host = Element::new("div");
        let ui = Queries::new("x-test", &host).finish();
        p(&ui, attr, None)
    }

    #[test]
    fn booleans_follow_presence() {
        let p = as_boolean();
        assert_eq!(run(&p, None), Value::Bool(false));
        assert_eq!(run(&p, Some("")), Value::Bool(true));
        assert_eq!(run(&p, Some("false")), Value::Bool(false));
    }

    #[test]
    fn integers_accept_hex_and_truncate() {
        let p = as_integer(7);
        assert_eq!(run(&p, None), Value::Int(7));
        assert_eq!(run(&p, Some("42")), Value::Int(42));
        assert_eq!(run(&p, Some(" -3.9 ")), Value::Int(-3));
        assert_eq!(run(&p, Some("0x1F")), Value::Int(31));
        assert_eq!(run(&p, Some("twelve")), Value::Int(7));
    }

    #[test]
    fn integers_reject_doubled_signs_and_overflow() {
        let p = as_integer(7);
        assert_eq!(run(&p, Some("--5")), Value::Int(7));
        assert_eq!(run(&p, Some("-+5")), Value::Int(7));
        assert_eq!(run(&p, Some("--1e30")), Value::Int(7));
        assert_eq!(run(&p, Some("1e30")), Value::Int(7));
        assert_eq!(run(&p, Some("-0x-8000000000000000")), Value::Int(7));
        assert_eq!(run(&p, Some("0x+1")), Value::Int(7));
        assert_eq!(run(&p, Some("-0x10")), Value::Int(-16));
        assert_eq!(run(&p, Some("-9223372036854775808")), Value::Int(i64::MIN));
        assert_eq!(parse_like(&Value::Int(3), "--1e30"), Value::Int(3));
    }

    #[test]
    fn numbers_fall_back_when_invalid() {
        let p = as_number(1.5);
        assert_eq!(run(&p, Some("2.25")), Value::Float(2.25));
        assert_eq!(run(&p, Some("NaN")), Value::Float(1.5));
        assert_eq!(run(&p, None), Value::Float(1.5));
    }

    #[test]
    fn strings_and_enums() {
        assert_eq!(run(&as_string("anon"), None), Value::from("anon"));
        assert_eq!(run(&as_string("anon"), Some("Ada")), Value::from("Ada"));

        let size = as_enum(&["small", "medium", "large"]);
        assert_eq!(run(&size, Some("LARGE")), Value::from("large"));
        assert_eq!(run(&size, Some("huge")), Value::from("small"));
        assert_eq!(run(&as_enum(&[]), Some("x")), Value::Null);
    }

    #[test]
    fn json_parses_structures() {
        let p = as_json(json!([]));
        assert_eq!(run(&p, Some(r#"{"a":1}"#)), Value::Json(json!({"a": 1})));
        assert_eq!(run(&p, Some("{broken")), Value::Json(json!([])));
    }

    #[test]
    fn plain_values_parse_by_kind() {
        assert_eq!(parse_like(&Value::Int(0), "12"), Value::Int(12));
        assert_eq!(parse_like(&Value::Int(3), "x"), Value::Int(3));
        assert_eq!(parse_like(&Value::Bool(false), ""), Value::Bool(true));
        assert_eq!(parse_like(&Value::from("a"), "b"), Value::from("b"));
        assert_eq!(
            parse_like(&Value::Json(json!({})), r#"{"a":[1]}"#),
            Value::Json(json!({"a": [1]}))
        );
        assert_eq!(
            parse_like(&Value::Json(json!([2])), "{broken"),
            Value::Json(json!([2]))
        );
    }
}
