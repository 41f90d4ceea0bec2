use super::helpers::{run, CountingStorage, RecordingLlm};
use crate::errors::ErrorKind;
use crate::parser::parse;
use crate::runtime::{ExecutionContext, Runtime};
use maplit::btreemap;
use serde_json::json;

#[test]
fn test_call_llm_end_to_end() {
    let source = "program demo\nagent a:\n def f():\n  step x = call_llm(prompt=\"hi\")\n end\nend\n";
    let program = parse(source);
    assert_eq!(program.tasks.len(), 1);
    assert_eq!(program.tasks[0].name, "a.f");
    assert_eq!(program.tasks[0].steps.len(), 1);
    assert_eq!(program.tasks[0].steps[0].kind(), "call_llm");
    assert_eq!(program.tasks[0].steps[0].assignment.as_deref(), Some("x"));

    let results = Runtime::new().execute(&program).unwrap();
    assert_eq!(results["a.f"]["x"], json!("[mocked:mock] hi"));
}

const STORE_PROGRAM: &str = "agent a:\n  def save():\n    store(\"k\",\"v\") requires capability.storage\n";

#[test]
fn test_store_with_storage_disabled_never_reaches_adapter() {
    let storage = CountingStorage::default();
    let runtime = Runtime::builder().storage_adapter(storage.clone()).build();

    let err = runtime.execute(&parse(STORE_PROGRAM)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageDisabled);
    assert_eq!(err.task(), Some("a.save"));
    assert_eq!(storage.count(), 0);
}

#[test]
fn test_store_with_storage_enabled_returns_key() {
    let results = Runtime::builder()
        .allow_storage(true)
        .build()
        .execute(&parse(STORE_PROGRAM))
        .unwrap();

    // unassigned last result is bound under the method name
    let stored = &results["a.save"]["save"];
    assert_eq!(stored["status"], json!("ok"));
    assert_eq!(stored["key"], json!("k"));
    assert_eq!(stored["meta"]["mock"], json!(true));
    assert_eq!(stored["meta"]["requesting_task"], json!("a.save"));
    assert_eq!(stored["meta"]["agent"], json!("a"));
    assert_eq!(stored["meta"]["size"], json!(1));
}

#[test]
fn test_store_through_adapter() {
    let storage = CountingStorage::default();
    let source = "program p(team=\"ops\")\nagent a:\n  def save(body):\n    r = store(key=\"k\", content=body) requires capability.storage\n";
    let runtime = Runtime::builder()
        .allow_storage(true)
        .storage_adapter(storage.clone())
        .build();
    let mut ctx = ExecutionContext::with_vars(btreemap! { "body".to_string() => json!("text") });

    let results = runtime.execute_in(&parse(source), &mut ctx).unwrap();
    assert_eq!(results["a.save"]["r"]["status"], json!("stored"));
    assert_eq!(storage.count(), 1);

    let seen = storage.seen.lock().unwrap();
    let (kwargs, action_ctx) = &seen[0];
    assert_eq!(kwargs["content"], json!("text"));
    assert_eq!(action_ctx.task, "a.save");
    assert_eq!(action_ctx.agent.as_deref(), Some("a"));
    assert_eq!(action_ctx.program_meta["team"], json!("ops"));
}

#[test]
fn test_false_precondition_aborts_before_steps() {
    let llm = RecordingLlm::default();
    let source = "agent a:\n  def f():\n    precondition: 1 == 0\n    x = call_llm(prompt=\"never\")\n";
    let runtime = Runtime::builder().llm(llm.clone()).build();
    let mut ctx = ExecutionContext::new();

    let err = runtime.execute_in(&parse(source), &mut ctx).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    assert!(err.to_string().contains("1 == 0"));
    assert!(ctx.get("x").is_none());
    assert!(llm.calls().is_empty());
}

#[test]
fn test_blank_precondition_does_not_abort() {
    let results = run("agent a:\n def f():\n precondition:\n x = fetch(\"u\")\n").unwrap();
    assert_eq!(results["a.f"]["x"], json!("fetched(u)"));
}

#[test]
fn test_postcondition_sees_assignments() {
    let ok = "agent a:\n  def f():\n    x = fetch(\"u\")\n    postcondition: x == \"fetched(u)\"\n";
    assert!(run(ok).is_ok());

    let bad = "agent a:\n  def f():\n    x = fetch(\"u\")\n    postcondition: x == \"other\"\n";
    let err = run(bad).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PostconditionFailed);
}

#[test]
fn test_variables_flow_between_tasks() {
    let source = r#"
agent a:
  def first():
    x = fetch("one")
  def second():
    assert(x == "fetched(one)")
    y = call_llm(prompt="got {{x}}")
"#;
    let results = run(source).unwrap();
    assert_eq!(results["a.first"].len(), 1);
    assert_eq!(results["a.second"]["x"], json!("fetched(one)"));
    assert_eq!(results["a.second"]["y"], json!("[mocked:mock] got fetched(one)"));
}

#[test]
fn test_error_keeps_earlier_assignments_in_context() {
    let source = "agent a:\n  def f():\n    x = fetch(\"u\")\n    assert(x == \"nope\")\n    y = fetch(\"v\")\n";
    let mut ctx = ExecutionContext::new();
    let err = Runtime::new().execute_in(&parse(source), &mut ctx).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AssertionFailed);
    assert_eq!(ctx.get("x"), Some(&json!("fetched(u)")));
    assert!(ctx.get("y").is_none());
}

#[test]
fn test_duplicate_tasks_last_result_wins() {
    let source = "agent a:\n  def f():\n    x = fetch(\"1\")\n  def f():\n    x = fetch(\"2\")\n";
    let results = run(source).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results["a.f"]["x"], json!("fetched(2)"));
}

#[test]
fn test_main_task_and_raw_echo() {
    let results = run("\"hello\"\nsomething odd\n").unwrap();
    // last step is the raw echo and is bound under `main`
    assert_eq!(results["main"]["main"], json!("something odd"));
}

#[test]
fn test_seeded_task_params() {
    let source = "agent a:\n  def f(payload):\n    precondition: payload is None\n    fetch(\"u\")\n";
    let program = parse(source);
    let mut ctx = ExecutionContext::new();
    ctx.seed_task_params(&program);
    let results = Runtime::new().execute_in(&program, &mut ctx).unwrap();
    assert_eq!(results["a.f"]["payload"], json!(null));

    // without seeding the name is unknown
    let err = Runtime::new().execute(&program).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExpressionEvaluationFailed);
}

#[test]
fn test_empty_program_runs() {
    assert!(run("").unwrap().is_empty());
}
