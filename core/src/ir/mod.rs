//! Graph IR export with deterministic node ids and a provenance hash
//!
//! Every step becomes a node; consecutive steps of the same task are joined by
//! an edge. Node ids depend only on the generator, program name, task name,
//! step index and step source, so re-exporting an unchanged program gives the
//! same ids and the same `ir_hash`.

mod hash;
mod schema;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::ast::Program;

pub use hash::{canonical_hash, canonical_json, node_id};
pub use schema::{validate_graph, SchemaError, SchemaRule, SchemaValidator};

/// Generator tag embedded in every graph and in node ids
pub const GENERATOR: &str = concat!("apl/", env!("CARGO_PKG_VERSION"));

pub const SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrGraph {
    pub program: String,
    pub meta: Map<String, JsonValue>,
    pub generator: String,
    #[serde(rename = "schemaVersion")]
    pub schema_version: String,
    pub nodes: Vec<IrNode>,
    pub edges: Vec<[String; 2]>,
    pub ir_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrNode {
    pub id: String,
    pub task: String,
    /// Action identifier, `call_llm` when the step has none
    pub kind: String,
    pub input: Option<String>,
    pub assignment: Option<String>,
    pub requires: Vec<String>,
    pub source: String,
}

/// Export `program` as a graph
pub fn to_graph(program: &Program) -> IrGraph {
    let mut nodes = Vec::with_capacity(program.step_count());
    let mut edges = Vec::new();

    for task in &program.tasks {
        let mut previous: Option<String> = None;
        for (index, step) in task.steps.iter().enumerate() {
            let id = node_id(GENERATOR, &program.name, &task.name, index, &step.raw);
            if let Some(from) = previous.take() {
                edges.push([from, id.clone()]);
            }
            previous = Some(id.clone());
            nodes.push(IrNode {
                id,
                task: task.name.clone(),
                kind: step.kind().to_string(),
                input: step.args.clone(),
                assignment: step.assignment.clone(),
                requires: step.requires.clone(),
                source: step.raw.clone(),
            });
        }
    }

    let ir_hash = compute_ir_hash(&nodes, &edges, GENERATOR);
    tracing::debug!(
        program = %program.name,
        nodes = nodes.len(),
        edges = edges.len(),
        ir_hash = %ir_hash,
        "exported IR graph"
    );

    IrGraph {
        program: program.name.clone(),
        meta: program.meta.clone(),
        generator: GENERATOR.to_string(),
        schema_version: SCHEMA_VERSION.to_string(),
        nodes,
        edges,
        ir_hash,
    }
}

fn compute_ir_hash(nodes: &[IrNode], edges: &[[String; 2]], generator: &str) -> String {
    let payload = serde_json::json!({
        "nodes": nodes,
        "edges": edges,
        "generator": generator,
    });
    canonical_hash(&payload)
}

impl IrGraph {
    pub fn to_value(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Run the schema rules over the serialized graph
    pub fn validate(&self) -> crate::errors::Result<()> {
        validate_graph(&self.to_value())?;
        Ok(())
    }

    /// Recompute `ir_hash` from nodes, edges and generator
    pub fn recompute_hash(&self) -> String {
        compute_ir_hash(&self.nodes, &self.edges, &self.generator)
    }
}

/// Validate a persisted graph and check that its `ir_hash` matches its content
pub fn verify_integrity(graph: &JsonValue) -> Result<(), SchemaError> {
    validate_graph(graph)?;
    let payload = serde_json::json!({
        "nodes": graph["nodes"],
        "edges": graph["edges"],
        "generator": graph["generator"],
    });
    let expected = canonical_hash(&payload);
    let recorded = graph["ir_hash"].as_str().unwrap_or_default();
    if recorded != expected {
        return Err(SchemaError::new(
            "ir_hash",
            format!("recorded hash {} does not match content hash {}", recorded, expected),
        ));
    }
    Ok(())
}
