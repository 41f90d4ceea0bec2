//! Built-in IR schema rules

use serde_json::Value as JsonValue;
use std::collections::HashSet;

use super::{SchemaError, SchemaRule};

/* ===================== Required Fields ===================== */

/// Every field present with the right JSON type
pub struct RequiredFieldsRule;

#[derive(Clone, Copy)]
enum Expect {
    Str,
    OptStr,
    Object,
    Array,
    StrArray,
}

impl Expect {
    fn matches(self, value: &JsonValue) -> bool {
        match self {
            Expect::Str => value.is_string(),
            Expect::OptStr => value.is_string() || value.is_null(),
            Expect::Object => value.is_object(),
            Expect::Array => value.is_array(),
            Expect::StrArray => value
                .as_array()
                .map(|items| items.iter().all(JsonValue::is_string))
                .unwrap_or(false),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Expect::Str => "a string",
            Expect::OptStr => "a string or null",
            Expect::Object => "an object",
            Expect::Array => "an array",
            Expect::StrArray => "an array of strings",
        }
    }
}

const GRAPH_FIELDS: &[(&str, Expect)] = &[
    ("program", Expect::Str),
    ("meta", Expect::Object),
    ("generator", Expect::Str),
    ("schemaVersion", Expect::Str),
    ("nodes", Expect::Array),
    ("edges", Expect::Array),
    ("ir_hash", Expect::Str),
];

const NODE_FIELDS: &[(&str, Expect)] = &[
    ("id", Expect::Str),
    ("task", Expect::Str),
    ("kind", Expect::Str),
    ("input", Expect::OptStr),
    ("assignment", Expect::OptStr),
    ("requires", Expect::StrArray),
    ("source", Expect::Str),
];

fn check_fields(value: &JsonValue, path: &str, fields: &[(&str, Expect)]) -> Result<(), SchemaError> {
    let object = value
        .as_object()
        .ok_or_else(|| SchemaError::new(path, "expected an object"))?;
    for (name, expect) in fields {
        let field_path = if path == "$" {
            name.to_string()
        } else {
            format!("{}.{}", path, name)
        };
        match object.get(*name) {
            None => return Err(SchemaError::new(field_path, "required field is missing")),
            Some(v) if !expect.matches(v) => {
                return Err(SchemaError::new(
                    field_path,
                    format!("expected {}", expect.describe()),
                ))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

impl SchemaRule for RequiredFieldsRule {
    fn id(&self) -> &'static str {
        "required-fields"
    }

    fn description(&self) -> &'static str {
        "Graph, node and edge fields are present with the expected types"
    }

    fn check(&self, graph: &JsonValue) -> Result<(), SchemaError> {
        check_fields(graph, "$", GRAPH_FIELDS)?;

        for (i, node) in nodes(graph).iter().enumerate() {
            check_fields(node, &format!("nodes[{}]", i), NODE_FIELDS)?;
        }

        for (i, edge) in edges(graph).iter().enumerate() {
            let pair = edge
                .as_array()
                .filter(|pair| pair.len() == 2)
                .ok_or_else(|| SchemaError::new(format!("edges[{}]", i), "expected a [from, to] pair"))?;
            for (j, end) in pair.iter().enumerate() {
                if !end.is_string() {
                    return Err(SchemaError::new(format!("edges[{}][{}]", i, j), "expected a string"));
                }
            }
        }
        Ok(())
    }
}

/* ===================== Unique Node Ids ===================== */

pub struct UniqueNodeIdsRule;

impl SchemaRule for UniqueNodeIdsRule {
    fn id(&self) -> &'static str {
        "unique-node-ids"
    }

    fn description(&self) -> &'static str {
        "No two nodes share an id"
    }

    fn check(&self, graph: &JsonValue) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for (i, node) in nodes(graph).iter().enumerate() {
            if let Some(id) = node.get("id").and_then(JsonValue::as_str) {
                if !seen.insert(id) {
                    return Err(SchemaError::new(
                        format!("nodes[{}].id", i),
                        format!("duplicate node id {}", id),
                    ));
                }
            }
        }
        Ok(())
    }
}

/* ===================== Edge Endpoints ===================== */

pub struct EdgeEndpointsRule;

impl SchemaRule for EdgeEndpointsRule {
    fn id(&self) -> &'static str {
        "edge-endpoints"
    }

    fn description(&self) -> &'static str {
        "Both ends of every edge name an existing node"
    }

    fn check(&self, graph: &JsonValue) -> Result<(), SchemaError> {
        let ids: HashSet<&str> = nodes(graph)
            .iter()
            .filter_map(|n| n.get("id").and_then(JsonValue::as_str))
            .collect();
        for (i, edge) in edges(graph).iter().enumerate() {
            let ends = edge.as_array().map(Vec::as_slice).unwrap_or(&[]);
            for (j, end) in ends.iter().enumerate() {
                let id = end.as_str().unwrap_or_default();
                if !ids.contains(id) {
                    return Err(SchemaError::new(
                        format!("edges[{}][{}]", i, j),
                        format!("unknown node id {}", id),
                    ));
                }
            }
        }
        Ok(())
    }
}

/* ===================== Helpers ===================== */

fn nodes(graph: &JsonValue) -> &[JsonValue] {
    graph
        .get("nodes")
        .and_then(JsonValue::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn edges(graph: &JsonValue) -> &[JsonValue] {
    graph
        .get("edges")
        .and_then(JsonValue::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
