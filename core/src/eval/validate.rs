//! Whitelist check run before any evaluation
//!
//! Rejection is structural: the first forbidden node found in a depth-first
//! walk decides the reason, and nothing is evaluated.

use super::ast::{ComprehensionKind, Expr};

/// Functions an expression may call by bare name
pub const ALLOWED_FUNCTIONS: &[&str] = &["len", "min", "max", "sum", "int", "float", "str", "bool"];

pub(crate) fn check(expr: &Expr) -> Result<(), String> {
    match expr {
        Expr::None
        | Expr::Bool { .. }
        | Expr::Int { .. }
        | Expr::Float { .. }
        | Expr::Str { .. }
        | Expr::Name { .. } => Ok(()),
        Expr::List { items } => items.iter().try_for_each(check),
        Expr::Dict { entries } => entries.iter().try_for_each(|(k, v)| {
            check(k)?;
            check(v)
        }),
        Expr::Unary { operand, .. } => check(operand),
        Expr::Binary { left, right, .. } => {
            check(left)?;
            check(right)
        }
        Expr::Logical { values, .. } => values.iter().try_for_each(check),
        Expr::Compare { left, rest } => {
            check(left)?;
            rest.iter().try_for_each(|(_, e)| check(e))
        }
        Expr::IfElse { test, body, orelse } => {
            check(test)?;
            check(body)?;
            check(orelse)
        }
        Expr::Subscript { value, index } => {
            check(value)?;
            check(index)
        }
        Expr::Call { func, args, kwargs } => {
            match func.as_ref() {
                Expr::Name { name } if ALLOWED_FUNCTIONS.contains(&name.as_str()) => {}
                Expr::Name { name } => {
                    return Err(format!("call to '{}' is not allowed", name));
                }
                other => {
                    check(other)?;
                    return Err("only calls to whitelisted functions are allowed".to_string());
                }
            }
            args.iter().try_for_each(check)?;
            kwargs.iter().try_for_each(|(_, e)| check(e))
        }
        Expr::Attribute { attr, .. } => Err(format!("attribute access '.{}' is not allowed", attr)),
        Expr::Lambda { .. } => Err("lambda is not allowed".to_string()),
        Expr::Comprehension { kind } => Err(format!(
            "{} comprehension is not allowed",
            match kind {
                ComprehensionKind::List => "list",
                ComprehensionKind::Set => "set",
                ComprehensionKind::Dict => "dict",
                ComprehensionKind::Generator => "generator",
            }
        )),
        Expr::Import { .. } => Err("import is not allowed".to_string()),
    }
}
