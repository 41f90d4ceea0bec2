use super::*;
use crate::parser::parse;
use serde_json::json;

const SOURCE: &str = r#"program notifier(channel="ops")
agent watcher binds mcp.newsapi as news:
  def scan(topic):
    items = news.search(query=topic)
    summary = call_llm(prompt="summarise {{items}}")
  def report():
    store("k", summary) requires capability.storage
end
"hello"
"#;

#[test]
fn test_nodes_and_edges_follow_tasks() {
    let graph = to_graph(&parse(SOURCE));

    assert_eq!(graph.program, "notifier");
    assert_eq!(graph.meta["channel"], json!("ops"));
    assert_eq!(graph.nodes.len(), 4);

    // edges join consecutive steps of the same task only
    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0], [graph.nodes[0].id.clone(), graph.nodes[1].id.clone()]);

    let tasks: Vec<&str> = graph.nodes.iter().map(|n| n.task.as_str()).collect();
    assert_eq!(tasks, vec!["watcher.scan", "watcher.scan", "watcher.report", "main"]);
}

#[test]
fn test_node_fields() {
    let graph = to_graph(&parse(SOURCE));

    let search = &graph.nodes[0];
    assert_eq!(search.kind, "news.search");
    assert_eq!(search.input.as_deref(), Some("query=topic"));
    assert_eq!(search.assignment.as_deref(), Some("items"));
    assert_eq!(search.source, "items = news.search(query=topic)");

    let store = &graph.nodes[2];
    assert_eq!(store.kind, "store");
    assert_eq!(store.requires, vec!["storage".to_string()]);
    assert_eq!(store.assignment, None);

    assert_eq!(graph.nodes[3].kind, "call_llm");
}

#[test]
fn test_unknown_step_kind_defaults_to_call_llm() {
    let graph = to_graph(&parse("something odd\n"));
    assert_eq!(graph.nodes.len(), 1);
    assert_eq!(graph.nodes[0].kind, "call_llm");
    assert_eq!(graph.nodes[0].task, "main");
}

#[test]
fn test_ids_and_hash_are_stable() {
    let first = to_graph(&parse(SOURCE));
    let second = to_graph(&parse(SOURCE));
    assert_eq!(first.ir_hash, second.ir_hash);
    assert_eq!(first.nodes, second.nodes);
    assert_eq!(first.ir_hash.len(), 64);
    assert_eq!(first.recompute_hash(), first.ir_hash);

    let expected = node_id(GENERATOR, "notifier", "watcher.scan", 0, "items = news.search(query=topic)");
    assert_eq!(first.nodes[0].id, expected);
}

#[test]
fn test_source_change_moves_hash() {
    let before = to_graph(&parse(SOURCE));
    let after = to_graph(&parse(&SOURCE.replace("summarise", "condense")));
    assert_ne!(before.ir_hash, after.ir_hash);
    assert_eq!(before.nodes[0].id, after.nodes[0].id);
    assert_ne!(before.nodes[1].id, after.nodes[1].id);
}

#[test]
fn test_exported_graph_validates() {
    let value = to_graph(&parse(SOURCE)).to_value();
    assert_eq!(value["schemaVersion"], json!(SCHEMA_VERSION));
    assert!(value.get("schema_version").is_none());
    assert_eq!(value["generator"], json!(GENERATOR));
    assert!(validate_graph(&value).is_ok());
    assert!(verify_integrity(&value).is_ok());

    let reparsed: IrGraph = serde_json::from_str(&to_graph(&parse(SOURCE)).to_json_pretty()).unwrap();
    assert_eq!(reparsed, to_graph(&parse(SOURCE)));
}

#[test]
fn test_empty_program_graph() {
    let graph = to_graph(&parse(""));
    assert_eq!(graph.program, crate::ast::UNNAMED_PROGRAM);
    assert!(graph.nodes.is_empty());
    assert!(verify_integrity(&graph.to_value()).is_ok());
}

#[test]
fn test_missing_field_is_reported_with_path() {
    let mut value = to_graph(&parse(SOURCE)).to_value();
    value["nodes"][2].as_object_mut().unwrap().remove("source");
    let err = validate_graph(&value).unwrap_err();
    assert_eq!(err.path, "nodes[2].source");

    let mut value = to_graph(&parse(SOURCE)).to_value();
    value.as_object_mut().unwrap().remove("ir_hash");
    assert_eq!(validate_graph(&value).unwrap_err().path, "ir_hash");

    assert_eq!(validate_graph(&json!([])).unwrap_err().path, "$");
}

#[test]
fn test_wrong_field_types() {
    let mut value = to_graph(&parse(SOURCE)).to_value();
    value["nodes"][0]["requires"] = json!([1]);
    let err = validate_graph(&value).unwrap_err();
    assert_eq!(err.to_string(), "nodes[0].requires: expected an array of strings");

    let mut value = to_graph(&parse(SOURCE)).to_value();
    value["edges"][0] = json!(["a"]);
    assert_eq!(validate_graph(&value).unwrap_err().path, "edges[0]");

    let mut value = to_graph(&parse(SOURCE)).to_value();
    value["edges"][0][1] = json!(7);
    assert_eq!(validate_graph(&value).unwrap_err().path, "edges[0][1]");
}

#[test]
fn test_duplicate_node_id() {
    let mut value = to_graph(&parse(SOURCE)).to_value();
    value["nodes"][3]["id"] = value["nodes"][0]["id"].clone();
    let err = validate_graph(&value).unwrap_err();
    assert_eq!(err.path, "nodes[3].id");
    assert!(err.message.starts_with("duplicate node id"));
}

#[test]
fn test_dangling_edge() {
    let mut value = to_graph(&parse(SOURCE)).to_value();
    value["edges"][0][1] = json!("nope");
    let err = validate_graph(&value).unwrap_err();
    assert_eq!(err, SchemaError::new("edges[0][1]", "unknown node id nope"));
}

#[test]
fn test_tampering_breaks_integrity() {
    let mut value = to_graph(&parse(SOURCE)).to_value();
    value["nodes"][1]["source"] = json!("summary = call_llm(prompt=\"leak\")");

    // still well-formed, but the hash no longer matches
    assert!(validate_graph(&value).is_ok());
    let err = verify_integrity(&value).unwrap_err();
    assert_eq!(err.path, "ir_hash");
}

#[test]
fn test_validator_lists_rules() {
    let ids: Vec<&str> = SchemaValidator::default().rules().map(|(id, _)| id).collect();
    assert_eq!(ids, vec!["required-fields", "unique-node-ids", "edge-endpoints"]);
}

#[test]
fn test_graph_validate_maps_to_crate_error() {
    let graph = to_graph(&parse(SOURCE));
    assert!(graph.validate().is_ok());

    let mut broken = graph.clone();
    broken.nodes[1].id = broken.nodes[0].id.clone();
    let err = broken.validate().unwrap_err();
    assert_eq!(err.kind(), crate::errors::ErrorKind::SchemaValidationFailed);
    assert!(err.to_string().contains("nodes[1].id"));
}

#[test]
fn test_identical_duplicate_tasks_collide_on_node_ids() {
    let source = "agent a:\n  def f():\n    fetch(\"1\")\n  def f():\n    fetch(\"1\")\n";
    let graph = to_graph(&parse(source));
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.nodes[0].id, graph.nodes[1].id);

    let err = validate_graph(&graph.to_value()).unwrap_err();
    assert_eq!(err.path, "nodes[1].id");

    // differing step text keeps the ids apart
    let distinct = to_graph(&parse(&source.replacen("\"1\"", "\"2\"", 1)));
    assert!(distinct.validate().is_ok());
}
