//! Error types for program execution and IR validation
//!
//! Parsing never produces an `Error`; malformed lines degrade into
//! best-effort steps and are reported as [`crate::parser::RecoveryNote`]s.
//! Every variant here is fatal for the run that raised it.

use std::fmt;
use thiserror::Error;

use crate::eval::EvalError;
use crate::ir::SchemaError;

pub type Result<T> = std::result::Result<T, Error>;

/// Classification of an [`Error`], stable across message changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PreconditionFailed,
    PostconditionFailed,
    MissingCapability,
    StorageDisabled,
    ExpressionRejected,
    ExpressionEvaluationFailed,
    AssertionFailed,
    UnsupportedAction,
    AdapterFailed,
    SchemaValidationFailed,
    ConfigInvalid,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PreconditionFailed => "PreconditionFailed",
            ErrorKind::PostconditionFailed => "PostconditionFailed",
            ErrorKind::MissingCapability => "MissingCapability",
            ErrorKind::StorageDisabled => "StorageDisabled",
            ErrorKind::ExpressionRejected => "ExpressionRejected",
            ErrorKind::ExpressionEvaluationFailed => "ExpressionEvaluationFailed",
            ErrorKind::AssertionFailed => "AssertionFailed",
            ErrorKind::UnsupportedAction => "UnsupportedAction",
            ErrorKind::AdapterFailed => "AdapterFailed",
            ErrorKind::SchemaValidationFailed => "SchemaValidationFailed",
            ErrorKind::ConfigInvalid => "ConfigInvalid",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("precondition failed for task '{task}': {expr}")]
    PreconditionFailed { task: String, expr: String },

    #[error("postcondition failed for task '{task}': {expr}")]
    PostconditionFailed { task: String, expr: String },

    #[error("task '{task}' step `{step}` requires capability '{capability}' which is not granted")]
    MissingCapability {
        task: String,
        step: String,
        capability: String,
    },

    #[error("storage capability not enabled for runtime (task '{task}', step `{step}`): {reason}")]
    StorageDisabled {
        task: String,
        step: String,
        reason: String,
    },

    /// An expression failed inside a task; `step` is `None` for pre/postconditions
    #[error("{}", expression_message(.task, .step, .source))]
    Expression {
        task: String,
        step: Option<String>,
        #[source]
        source: EvalError,
    },

    #[error("assertion failed in task '{task}': {expr}")]
    AssertionFailed { task: String, expr: String },

    #[error("unsupported action '{action}' in task '{task}': {reason}")]
    UnsupportedAction {
        task: String,
        action: String,
        reason: String,
    },

    /// An external adapter (text generation, storage) returned an error
    #[error("adapter call failed in task '{task}' step `{step}`")]
    Adapter {
        task: String,
        step: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("IR schema validation failed: {0}")]
    SchemaValidationFailed(#[from] SchemaError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

fn expression_message(task: &str, step: &Option<String>, source: &EvalError) -> String {
    match step {
        Some(step) => format!("task '{}' step `{}`: {}", task, step, source),
        None => format!("task '{}': {}", task, source),
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PreconditionFailed { .. } => ErrorKind::PreconditionFailed,
            Error::PostconditionFailed { .. } => ErrorKind::PostconditionFailed,
            Error::MissingCapability { .. } => ErrorKind::MissingCapability,
            Error::StorageDisabled { .. } => ErrorKind::StorageDisabled,
            Error::Expression { source, .. } => match source {
                EvalError::Rejected { .. } => ErrorKind::ExpressionRejected,
                EvalError::Failed { .. } => ErrorKind::ExpressionEvaluationFailed,
            },
            Error::AssertionFailed { .. } => ErrorKind::AssertionFailed,
            Error::UnsupportedAction { .. } => ErrorKind::UnsupportedAction,
            Error::Adapter { .. } => ErrorKind::AdapterFailed,
            Error::SchemaValidationFailed(_) => ErrorKind::SchemaValidationFailed,
            Error::Config(_) => ErrorKind::ConfigInvalid,
        }
    }

    /// Task in which the error was raised, if any
    pub fn task(&self) -> Option<&str> {
        match self {
            Error::PreconditionFailed { task, .. }
            | Error::PostconditionFailed { task, .. }
            | Error::MissingCapability { task, .. }
            | Error::StorageDisabled { task, .. }
            | Error::Expression { task, .. }
            | Error::AssertionFailed { task, .. }
            | Error::UnsupportedAction { task, .. }
            | Error::Adapter { task, .. } => Some(task),
            Error::SchemaValidationFailed(_) | Error::Config(_) => None,
        }
    }
}
