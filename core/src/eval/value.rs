//! Value helpers with Python-compatible truthiness, equality and ordering

use serde_json::{Number, Value as JsonValue};
use std::cmp::Ordering;

/// A number viewed the way arithmetic sees it; `bool` counts as an int
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub(crate) fn of(value: &JsonValue) -> Option<Num> {
        match value {
            JsonValue::Bool(b) => Some(Num::Int(i64::from(*b))),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Some(Num::Int(i)),
                None => n.as_f64().map(Num::Float),
            },
            _ => None,
        }
    }

    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    pub(crate) fn into_value(self) -> Result<JsonValue, String> {
        match self {
            Num::Int(i) => Ok(JsonValue::from(i)),
            Num::Float(f) => float_value(f),
        }
    }
}

/// JSON cannot carry NaN or infinities, so those become evaluation failures
pub(crate) fn float_value(f: f64) -> Result<JsonValue, String> {
    Number::from_f64(f)
        .map(JsonValue::Number)
        .ok_or_else(|| format!("float result {} is not representable", f))
}

/// Python truthiness
pub fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(items) => !items.is_empty(),
        JsonValue::Object(map) => !map.is_empty(),
    }
}

/// Python type name, used in error messages
pub(crate) fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "NoneType",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(n) if n.is_f64() => "float",
        JsonValue::Number(_) => "int",
        JsonValue::String(_) => "str",
        JsonValue::Array(_) => "list",
        JsonValue::Object(_) => "dict",
    }
}

/// Text as Python's `str()` would render it
pub fn display(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => repr(other),
    }
}

/// Text as Python's `repr()` would render it
pub(crate) fn repr(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "None".to_string(),
        JsonValue::Bool(true) => "True".to_string(),
        JsonValue::Bool(false) => "False".to_string(),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => match n.as_u64() {
                Some(u) => u.to_string(),
                None => float_repr(n.as_f64().unwrap_or_default()),
            },
        },
        JsonValue::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        JsonValue::Array(items) => {
            let parts: Vec<String> = items.iter().map(repr).collect();
            format!("[{}]", parts.join(", "))
        }
        JsonValue::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("'{}': {}", k, repr(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

fn float_repr(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

/// `==` with Python's numeric tower (`1 == 1.0 == True`)
pub(crate) fn values_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Array(x), JsonValue::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (JsonValue::Object(x), JsonValue::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).map(|w| values_equal(v, w)).unwrap_or(false))
        }
        _ => match (Num::of(a), Num::of(b)) {
            (Some(Num::Int(x)), Some(Num::Int(y))) => x == y,
            (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
            _ => a == b,
        },
    }
}

/// Ordering for `<`, `min`, `max`; mismatched types are a `TypeError`
pub(crate) fn compare(a: &JsonValue, b: &JsonValue, op: &str) -> Result<Ordering, String> {
    if let (Some(x), Some(y)) = (Num::of(a), Num::of(b)) {
        return match (x, y) {
            (Num::Int(x), Num::Int(y)) => Ok(x.cmp(&y)),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .ok_or_else(|| "cannot order NaN".to_string()),
        };
    }
    match (a, b) {
        (JsonValue::String(x), JsonValue::String(y)) => Ok(x.cmp(y)),
        (JsonValue::Array(x), JsonValue::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                if values_equal(l, r) {
                    continue;
                }
                return compare(l, r, op);
            }
            Ok(x.len().cmp(&y.len()))
        }
        _ => Err(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op,
            type_name(a),
            type_name(b)
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness_matches_python() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!(0.0)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!([])));
        assert!(!truthy(&json!({})));
        assert!(truthy(&json!("0")));
        assert!(truthy(&json!([0])));
    }

    #[test]
    fn test_display_uses_python_spelling() {
        assert_eq!(display(&json!(null)), "None");
        assert_eq!(display(&json!(true)), "True");
        assert_eq!(display(&json!(3.0)), "3.0");
        assert_eq!(display(&json!(0.5)), "0.5");
        assert_eq!(display(&json!("raw")), "raw");
        assert_eq!(display(&json!([1, "a", null])), "[1, 'a', None]");
        assert_eq!(display(&json!({"k": false})), "{'k': False}");
    }

    #[test]
    fn test_numeric_equality_crosses_types() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(values_equal(&json!(true), &json!(1)));
        assert!(values_equal(&json!([1, 2.0]), &json!([1.0, 2])));
        assert!(!values_equal(&json!("1"), &json!(1)));
    }

    #[test]
    fn test_compare_rejects_mixed_types() {
        assert_eq!(compare(&json!(1), &json!(2.5), "<").unwrap(), Ordering::Less);
        assert_eq!(compare(&json!("b"), &json!("a"), "<").unwrap(), Ordering::Greater);
        assert_eq!(compare(&json!([1, 2]), &json!([1]), "<").unwrap(), Ordering::Greater);
        let err = compare(&json!("a"), &json!(1), "<").unwrap_err();
        assert!(err.contains("'str' and 'int'"));
    }
}
