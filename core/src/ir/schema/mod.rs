//! Rule-based validation of persisted IR graphs
//!
//! Each rule checks one property of the JSON document and reports the first
//! violation with a field path such as `nodes[2].id` or `edges[0][1]`. Rules
//! run in registration order; the shape rule comes first so that the others
//! can assume well-typed fields.
//!
//! # Adding a Rule
//!
//! 1. Implement [`SchemaRule`] in `rules.rs`
//! 2. Register it in [`SchemaValidator::new`]

mod rules;

use serde_json::Value as JsonValue;
use thiserror::Error;

pub use rules::{EdgeEndpointsRule, RequiredFieldsRule, UniqueNodeIdsRule};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct SchemaError {
    /// Path of the offending field, `$` for the document itself
    pub path: String,
    pub message: String,
}

impl SchemaError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub trait SchemaRule: Send + Sync {
    /// Unique identifier, e.g. `"unique-node-ids"`
    fn id(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn check(&self, graph: &JsonValue) -> Result<(), SchemaError>;
}

pub struct SchemaValidator {
    rules: Vec<Box<dyn SchemaRule>>,
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(RequiredFieldsRule),
                Box::new(UniqueNodeIdsRule),
                Box::new(EdgeEndpointsRule),
            ],
        }
    }

    /// First violation across all rules
    pub fn validate(&self, graph: &JsonValue) -> Result<(), SchemaError> {
        for rule in &self.rules {
            if let Err(err) = rule.check(graph) {
                tracing::debug!(rule = rule.id(), path = %err.path, "IR schema violation");
                return Err(err);
            }
        }
        Ok(())
    }

    pub fn rules(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.rules.iter().map(|r| (r.id(), r.description()))
    }
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a graph document with the built-in rules
pub fn validate_graph(graph: &JsonValue) -> Result<(), SchemaError> {
    SchemaValidator::new().validate(graph)
}
