//! The whitelisted functions: `len`, `min`, `max`, `sum`, `int`, `float`, `str`, `bool`

use serde_json::Value as JsonValue;
use std::cmp::Ordering;

use super::ast::BinaryOp;
use super::interp::binary;
use super::value::{compare, display, float_value, repr, truthy, type_name, Num};

type CallResult = Result<JsonValue, String>;

pub(crate) fn call(name: &str, args: Vec<JsonValue>, kwargs: Vec<(String, JsonValue)>) -> CallResult {
    if name == "sum" {
        return sum(args, kwargs);
    }
    if !kwargs.is_empty() {
        return Err(format!("{}() takes no keyword arguments", name));
    }
    match name {
        "len" => len(single(name, args)?),
        "min" => extreme(name, args, Ordering::Less),
        "max" => extreme(name, args, Ordering::Greater),
        "int" => int(optional(name, args)?),
        "float" => float(optional(name, args)?),
        "str" => Ok(JsonValue::String(
            optional(name, args)?.map(|v| display(&v)).unwrap_or_default(),
        )),
        "bool" => Ok(JsonValue::Bool(
            optional(name, args)?.map(|v| truthy(&v)).unwrap_or(false),
        )),
        other => Err(format!("name '{}' is not defined", other)),
    }
}

/* ===================== Arity ===================== */

fn single(name: &str, args: Vec<JsonValue>) -> Result<JsonValue, String> {
    let count = args.len();
    let mut args = args.into_iter();
    match (args.next(), count) {
        (Some(value), 1) => Ok(value),
        _ => Err(format!("{}() takes exactly one argument ({} given)", name, count)),
    }
}

fn optional(name: &str, args: Vec<JsonValue>) -> Result<Option<JsonValue>, String> {
    if args.len() > 1 {
        return Err(format!(
            "{}() takes at most 1 argument ({} given)",
            name,
            args.len()
        ));
    }
    Ok(args.into_iter().next())
}

/// Elements of a list, or the characters of a string
fn iterate(value: JsonValue) -> Result<Vec<JsonValue>, String> {
    match value {
        JsonValue::Array(items) => Ok(items),
        JsonValue::String(s) => Ok(s.chars().map(|c| JsonValue::String(c.to_string())).collect()),
        JsonValue::Object(map) => Ok(map.into_iter().map(|(k, _)| JsonValue::String(k)).collect()),
        other => Err(format!("'{}' object is not iterable", type_name(&other))),
    }
}

/* ===================== Functions ===================== */

fn len(value: JsonValue) -> CallResult {
    let n = match &value {
        JsonValue::String(s) => s.chars().count(),
        JsonValue::Array(items) => items.len(),
        JsonValue::Object(map) => map.len(),
        other => return Err(format!("object of type '{}' has no len()", type_name(other))),
    };
    Ok(JsonValue::from(n))
}

/// `min`/`max`: the first element that nothing else beats
fn extreme(name: &str, args: Vec<JsonValue>, wanted: Ordering) -> CallResult {
    let candidates = match args.len() {
        0 => return Err(format!("{} expected at least 1 argument, got 0", name)),
        1 => iterate(args.into_iter().next().unwrap_or_default())?,
        _ => args,
    };
    let mut best: Option<JsonValue> = None;
    for item in candidates {
        best = match best {
            None => Some(item),
            Some(current) => {
                if compare(&item, &current, if wanted == Ordering::Less { "<" } else { ">" })? == wanted {
                    Some(item)
                } else {
                    Some(current)
                }
            }
        };
    }
    best.ok_or_else(|| format!("{}() arg is an empty sequence", name))
}

fn sum(args: Vec<JsonValue>, kwargs: Vec<(String, JsonValue)>) -> CallResult {
    let mut args = args.into_iter();
    let iterable = args
        .next()
        .ok_or_else(|| "sum() takes at least 1 positional argument (0 given)".to_string())?;
    let mut start = args.next();
    if args.next().is_some() {
        return Err("sum() takes at most 2 arguments".to_string());
    }
    for (key, value) in kwargs {
        if key != "start" || start.is_some() {
            return Err(format!("sum() got an unexpected keyword argument '{}'", key));
        }
        start = Some(value);
    }

    let start = start.unwrap_or_else(|| JsonValue::from(0));
    if start.is_string() {
        return Err("sum() can't sum strings [use ''.join(seq) instead]".to_string());
    }
    iterate(iterable)?
        .into_iter()
        .try_fold(start, |acc, item| binary(BinaryOp::Add, acc, item))
}

fn int(value: Option<JsonValue>) -> CallResult {
    let value = match value {
        None => return Ok(JsonValue::from(0)),
        Some(v) => v,
    };
    match (&value, Num::of(&value)) {
        (_, Some(Num::Int(i))) => Ok(JsonValue::from(i)),
        (_, Some(Num::Float(f))) => {
            let truncated = f.trunc();
            if !truncated.is_finite() || truncated.abs() >= i64::MAX as f64 {
                return Err(format!("cannot convert float {} to integer", f));
            }
            Ok(JsonValue::from(truncated as i64))
        }
        (JsonValue::String(s), _) => s
            .trim()
            .replace('_', "")
            .parse::<i64>()
            .map(JsonValue::from)
            .map_err(|_| format!("invalid literal for int() with base 10: {}", repr(&value))),
        _ => Err(format!(
            "int() argument must be a string or a number, not '{}'",
            type_name(&value)
        )),
    }
}

fn float(value: Option<JsonValue>) -> CallResult {
    let value = match value {
        None => return float_value(0.0),
        Some(v) => v,
    };
    match (&value, Num::of(&value)) {
        (_, Some(num)) => float_value(num.as_f64()),
        (JsonValue::String(s), _) => {
            let parsed = s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("could not convert string to float: {}", repr(&value)))?;
            float_value(parsed)
        }
        _ => Err(format!(
            "float() argument must be a string or a number, not '{}'",
            type_name(&value)
        )),
    }
}
