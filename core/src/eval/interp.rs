//! Tree-walking interpreter for validated expressions

use serde_json::{Map, Value as JsonValue};

use super::ast::{BinaryOp, BoolOp, CmpOp, Expr, UnaryOp};
use super::builtins;
use super::value::{compare, float_value, truthy, type_name, values_equal, Num};
use super::Vars;

type EvalResult = Result<JsonValue, String>;

pub(crate) struct Interpreter<'a> {
    vars: &'a Vars,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(vars: &'a Vars) -> Self {
        Self { vars }
    }

    pub(crate) fn eval(&self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::None => Ok(JsonValue::Null),
            Expr::Bool { v } => Ok(JsonValue::Bool(*v)),
            Expr::Int { v } => Ok(JsonValue::from(*v)),
            Expr::Float { v } => float_value(*v),
            Expr::Str { v } => Ok(JsonValue::String(v.clone())),
            Expr::Name { name } => self
                .vars
                .get(name)
                .cloned()
                .ok_or_else(|| format!("name '{}' is not defined", name)),
            Expr::List { items } => Ok(JsonValue::Array(
                items.iter().map(|e| self.eval(e)).collect::<Result<_, _>>()?,
            )),
            Expr::Dict { entries } => {
                let mut map = Map::new();
                for (key, value) in entries {
                    let key = match self.eval(key)? {
                        JsonValue::String(s) => s,
                        other => {
                            return Err(format!(
                                "dict keys must be str, not '{}'",
                                type_name(&other)
                            ))
                        }
                    };
                    map.insert(key, self.eval(value)?);
                }
                Ok(JsonValue::Object(map))
            }
            Expr::Unary { op, operand } => unary(*op, self.eval(operand)?),
            Expr::Binary { op, left, right } => binary(*op, self.eval(left)?, self.eval(right)?),
            Expr::Logical { op, values } => self.logical(*op, values),
            Expr::Compare { left, rest } => {
                let mut current = self.eval(left)?;
                for (op, right) in rest {
                    let next = self.eval(right)?;
                    if !comparison(*op, &current, &next)? {
                        return Ok(JsonValue::Bool(false));
                    }
                    current = next;
                }
                Ok(JsonValue::Bool(true))
            }
            Expr::IfElse { test, body, orelse } => {
                if truthy(&self.eval(test)?) {
                    self.eval(body)
                } else {
                    self.eval(orelse)
                }
            }
            Expr::Subscript { value, index } => subscript(self.eval(value)?, self.eval(index)?),
            Expr::Call { func, args, kwargs } => {
                let name = match func.as_ref() {
                    Expr::Name { name } => name,
                    _ => return Err("only calls to whitelisted functions are allowed".to_string()),
                };
                let args = args.iter().map(|e| self.eval(e)).collect::<Result<Vec<_>, _>>()?;
                let kwargs = kwargs
                    .iter()
                    .map(|(k, e)| Ok((k.clone(), self.eval(e)?)))
                    .collect::<Result<Vec<_>, String>>()?;
                builtins::call(name, args, kwargs)
            }
            Expr::Attribute { .. } | Expr::Lambda { .. } | Expr::Comprehension { .. } | Expr::Import { .. } => {
                Err("expression was not validated".to_string())
            }
        }
    }

    /// `and`/`or` short-circuit and return the deciding operand
    fn logical(&self, op: BoolOp, values: &[Expr]) -> EvalResult {
        let mut last = JsonValue::Null;
        for expr in values {
            last = self.eval(expr)?;
            let decided = match op {
                BoolOp::And => !truthy(&last),
                BoolOp::Or => truthy(&last),
            };
            if decided {
                break;
            }
        }
        Ok(last)
    }
}

/* ===================== Operators ===================== */

fn unary(op: UnaryOp, operand: JsonValue) -> EvalResult {
    match op {
        UnaryOp::Not => Ok(JsonValue::Bool(!truthy(&operand))),
        UnaryOp::Pos | UnaryOp::Neg => {
            let num = Num::of(&operand).ok_or_else(|| {
                format!(
                    "bad operand type for unary {}: '{}'",
                    if op == UnaryOp::Neg { "-" } else { "+" },
                    type_name(&operand)
                )
            })?;
            match (op, num) {
                (UnaryOp::Neg, Num::Int(i)) => i
                    .checked_neg()
                    .map(JsonValue::from)
                    .ok_or_else(|| "integer overflow".to_string()),
                (UnaryOp::Neg, Num::Float(f)) => float_value(-f),
                (_, num) => num.into_value(),
            }
        }
    }
}

pub(crate) fn binary(op: BinaryOp, left: JsonValue, right: JsonValue) -> EvalResult {
    if let (Some(l), Some(r)) = (Num::of(&left), Num::of(&right)) {
        return arithmetic(op, l, r);
    }
    match (op, &left, &right) {
        (BinaryOp::Add, JsonValue::String(l), JsonValue::String(r)) => {
            Ok(JsonValue::String(format!("{}{}", l, r)))
        }
        (BinaryOp::Add, JsonValue::Array(l), JsonValue::Array(r)) => {
            Ok(JsonValue::Array(l.iter().chain(r).cloned().collect()))
        }
        (BinaryOp::Mul, JsonValue::String(s), n) | (BinaryOp::Mul, n, JsonValue::String(s))
            if is_int(n) =>
        {
            let count = repeat_count(n);
            repeated_len(s.len(), count, MAX_REPEAT_BYTES)?;
            Ok(JsonValue::String(s.repeat(count)))
        }
        (BinaryOp::Mul, JsonValue::Array(items), n) | (BinaryOp::Mul, n, JsonValue::Array(items))
            if is_int(n) =>
        {
            let count = repeat_count(n);
            let mut out = Vec::with_capacity(repeated_len(items.len(), count, MAX_REPEAT_ITEMS)?);
            for _ in 0..count {
                out.extend(items.iter().cloned());
            }
            Ok(JsonValue::Array(out))
        }
        _ => Err(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            symbol(op),
            type_name(&left),
            type_name(&right)
        )),
    }
}

/// Upper bound on the output of string repetition, in bytes
const MAX_REPEAT_BYTES: usize = 1 << 20;

/// Upper bound on the output of list repetition, in elements
const MAX_REPEAT_ITEMS: usize = 1_000_000;

fn repeated_len(len: usize, count: usize, cap: usize) -> Result<usize, String> {
    len.checked_mul(count)
        .filter(|total| *total <= cap)
        .ok_or_else(|| "repeated sequence is too long".to_string())
}

fn is_int(value: &JsonValue) -> bool {
    matches!(Num::of(value), Some(Num::Int(_)))
}

fn repeat_count(value: &JsonValue) -> usize {
    match Num::of(value) {
        Some(Num::Int(n)) if n > 0 => n as usize,
        _ => 0,
    }
}

fn arithmetic(op: BinaryOp, left: Num, right: Num) -> EvalResult {
    let overflow = || "integer overflow".to_string();
    match (left, right) {
        (Num::Int(l), Num::Int(r)) => match op {
            BinaryOp::Add => l.checked_add(r).map(JsonValue::from).ok_or_else(overflow),
            BinaryOp::Sub => l.checked_sub(r).map(JsonValue::from).ok_or_else(overflow),
            BinaryOp::Mul => l.checked_mul(r).map(JsonValue::from).ok_or_else(overflow),
            BinaryOp::Div => {
                if r == 0 {
                    return Err("division by zero".to_string());
                }
                float_value(l as f64 / r as f64)
            }
            BinaryOp::FloorDiv => {
                if r == 0 {
                    return Err("integer division or modulo by zero".to_string());
                }
                let q = l.checked_div(r).ok_or_else(overflow)?;
                let adjust = l % r != 0 && ((l < 0) != (r < 0));
                Ok(JsonValue::from(if adjust { q - 1 } else { q }))
            }
            BinaryOp::Mod => {
                if r == 0 {
                    return Err("integer division or modulo by zero".to_string());
                }
                let rem = l.checked_rem(r).ok_or_else(overflow)?;
                let adjust = rem != 0 && ((rem < 0) != (r < 0));
                Ok(JsonValue::from(if adjust { rem + r } else { rem }))
            }
            BinaryOp::Pow => {
                if r < 0 {
                    if l == 0 {
                        return Err("0.0 cannot be raised to a negative power".to_string());
                    }
                    return float_value((l as f64).powf(r as f64));
                }
                let exp = u32::try_from(r).map_err(|_| overflow())?;
                l.checked_pow(exp).map(JsonValue::from).ok_or_else(overflow)
            }
        },
        (l, r) => {
            let (l, r) = (l.as_f64(), r.as_f64());
            match op {
                BinaryOp::Add => float_value(l + r),
                BinaryOp::Sub => float_value(l - r),
                BinaryOp::Mul => float_value(l * r),
                BinaryOp::Div if r == 0.0 => Err("float division by zero".to_string()),
                BinaryOp::Div => float_value(l / r),
                BinaryOp::FloorDiv if r == 0.0 => Err("float floor division by zero".to_string()),
                BinaryOp::FloorDiv => float_value((l / r).floor()),
                BinaryOp::Mod if r == 0.0 => Err("float modulo".to_string()),
                BinaryOp::Mod => float_value(l - r * (l / r).floor()),
                BinaryOp::Pow if l == 0.0 && r < 0.0 => {
                    Err("0.0 cannot be raised to a negative power".to_string())
                }
                BinaryOp::Pow => float_value(l.powf(r)),
            }
        }
    }
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::FloorDiv => "//",
        BinaryOp::Mod => "%",
        BinaryOp::Pow => "**",
    }
}

fn comparison(op: CmpOp, left: &JsonValue, right: &JsonValue) -> Result<bool, String> {
    use std::cmp::Ordering::*;
    Ok(match op {
        CmpOp::Eq => values_equal(left, right),
        CmpOp::Ne => !values_equal(left, right),
        CmpOp::Lt => compare(left, right, "<")? == Less,
        CmpOp::Le => compare(left, right, "<=")? != Greater,
        CmpOp::Gt => compare(left, right, ">")? == Greater,
        CmpOp::Ge => compare(left, right, ">=")? != Less,
        CmpOp::In => contains(right, left)?,
        CmpOp::NotIn => !contains(right, left)?,
        // Values have no identity; same type and same content is the closest match
        CmpOp::Is => left == right,
        CmpOp::IsNot => left != right,
    })
}

fn contains(container: &JsonValue, item: &JsonValue) -> Result<bool, String> {
    match container {
        JsonValue::String(haystack) => match item {
            JsonValue::String(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(format!(
                "'in <string>' requires string as left operand, not {}",
                type_name(other)
            )),
        },
        JsonValue::Array(items) => Ok(items.iter().any(|v| values_equal(v, item))),
        JsonValue::Object(map) => match item {
            JsonValue::String(key) => Ok(map.contains_key(key)),
            _ => Ok(false),
        },
        other => Err(format!(
            "argument of type '{}' is not iterable",
            type_name(other)
        )),
    }
}

fn subscript(value: JsonValue, index: JsonValue) -> EvalResult {
    match value {
        JsonValue::Object(map) => {
            let key = match &index {
                JsonValue::String(s) => s.clone(),
                other => super::value::repr(other),
            };
            map.get(&key)
                .cloned()
                .ok_or_else(|| format!("KeyError: {}", super::value::repr(&index)))
        }
        JsonValue::Array(items) => {
            let i = sequence_index(&index, items.len(), "list")?;
            Ok(items[i].clone())
        }
        JsonValue::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = sequence_index(&index, chars.len(), "string")?;
            Ok(JsonValue::String(chars[i].to_string()))
        }
        other => Err(format!(
            "'{}' object is not subscriptable",
            type_name(&other)
        )),
    }
}

fn sequence_index(index: &JsonValue, len: usize, what: &str) -> Result<usize, String> {
    let i = match (index, Num::of(index)) {
        (JsonValue::Bool(_), _) | (_, Some(Num::Float(_))) | (_, None) => {
            return Err(format!(
                "{} indices must be integers, not {}",
                what,
                type_name(index)
            ))
        }
        (_, Some(Num::Int(i))) => i,
    };
    let resolved = if i < 0 { i + len as i64 } else { i };
    if resolved < 0 || resolved >= len as i64 {
        return Err(format!("{} index out of range", what));
    }
    Ok(resolved as usize)
}
