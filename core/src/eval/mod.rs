//! Restricted expression evaluator
//!
//! Conditions (`precondition`, `assert`) and call arguments are written in a
//! small Python-like expression language. Every expression goes through three
//! phases:
//!
//! 1. parse with the pest grammar in `expr.pest` (syntax errors are rejections)
//! 2. structural validation against the whitelist in [`ALLOWED_FUNCTIONS`]
//! 3. interpretation over a [`Vars`] map with Python value semantics
//!
//! Nothing from the host environment is reachable from an expression except
//! through `env:` strings in call arguments, which the caller resolves with an
//! [`EnvResolver`].

mod ast;
mod builder;
mod builtins;
mod interp;
mod validate;
mod value;

#[cfg(test)]
mod tests;

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::adapters::EnvResolver;

pub use ast::{ArgList, BinaryOp, BoolOp, CmpOp, ComprehensionKind, Expr, UnaryOp};
pub use validate::ALLOWED_FUNCTIONS;
pub use value::{display, truthy};

/// Variable bindings visible to an expression
pub type Vars = BTreeMap<String, JsonValue>;

/// Prefix marking a call argument string as an environment reference
pub const ENV_PREFIX: &str = "env:";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// Syntax error or a construct outside the whitelist; nothing was evaluated
    #[error("expression rejected: `{expr}`: {reason}")]
    Rejected { expr: String, reason: String },

    /// The expression was allowed but raised while running
    #[error("expression evaluation failed: `{expr}`: {reason}")]
    Failed { expr: String, reason: String },
}

impl EvalError {
    pub fn expr(&self) -> &str {
        match self {
            EvalError::Rejected { expr, .. } | EvalError::Failed { expr, .. } => expr,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            EvalError::Rejected { reason, .. } | EvalError::Failed { reason, .. } => reason,
        }
    }
}

/// Evaluated arguments of a step call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<JsonValue>,
    pub keyword: BTreeMap<String, JsonValue>,
}

impl CallArgs {
    /// Keyword value, falling back to the positional slot `position`
    pub fn get(&self, name: &str, position: usize) -> Option<&JsonValue> {
        self.keyword
            .get(name)
            .or_else(|| self.positional.get(position))
    }

    /// Keywords merged with positionals named by `names`; keywords win
    pub fn named(&self, names: &[&str]) -> BTreeMap<String, JsonValue> {
        let mut merged = self.keyword.clone();
        for (name, value) in names.iter().zip(&self.positional) {
            merged
                .entry(name.to_string())
                .or_insert_with(|| value.clone());
        }
        merged
    }
}

/* ===================== Public API ===================== */

/// Parse and validate an expression without evaluating it
pub fn compile(text: &str) -> Result<Expr, EvalError> {
    let expr = builder::parse_expression(text).map_err(|reason| rejected(text, reason))?;
    validate::check(&expr).map_err(|reason| rejected(text, reason))?;
    Ok(expr)
}

/// Evaluate an expression to a value
pub fn evaluate(text: &str, vars: &Vars) -> Result<JsonValue, EvalError> {
    let expr = compile(text)?;
    interp::Interpreter::new(vars)
        .eval(&expr)
        .map_err(|reason| failed(text, reason))
}

/// Evaluate an expression and apply Python truthiness
pub fn evaluate_condition(text: &str, vars: &Vars) -> Result<bool, EvalError> {
    evaluate(text, vars).map(|v| truthy(&v))
}

/// Evaluate a call's argument text, e.g. `"k", content=x, token="env:API_TOKEN"`
///
/// Top-level string values starting with `env:` are replaced with the
/// resolved variable; an unset variable resolves to the empty string.
pub fn evaluate_call_args(
    text: &str,
    vars: &Vars,
    env: &dyn EnvResolver,
) -> Result<CallArgs, EvalError> {
    let list = builder::parse_arguments(text).map_err(|reason| rejected(text, reason))?;
    for expr in list.positional.iter().chain(list.keyword.iter().map(|(_, e)| e)) {
        validate::check(expr).map_err(|reason| rejected(text, reason))?;
    }

    let interpreter = interp::Interpreter::new(vars);
    let mut args = CallArgs::default();
    for expr in &list.positional {
        let value = interpreter.eval(expr).map_err(|reason| failed(text, reason))?;
        args.positional.push(resolve_env(value, env));
    }
    for (name, expr) in &list.keyword {
        let value = interpreter.eval(expr).map_err(|reason| failed(text, reason))?;
        args.keyword.insert(name.clone(), resolve_env(value, env));
    }
    Ok(args)
}

fn resolve_env(value: JsonValue, env: &dyn EnvResolver) -> JsonValue {
    match value {
        JsonValue::String(s) => match s.strip_prefix(ENV_PREFIX) {
            Some(key) => JsonValue::String(env.resolve(key).unwrap_or_default()),
            None => JsonValue::String(s),
        },
        other => other,
    }
}

fn rejected(text: &str, reason: String) -> EvalError {
    tracing::debug!(expr = text, reason = %reason, "expression rejected");
    EvalError::Rejected {
        expr: text.to_string(),
        reason,
    }
}

fn failed(text: &str, reason: String) -> EvalError {
    EvalError::Failed {
        expr: text.to_string(),
        reason,
    }
}
