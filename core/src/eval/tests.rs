use super::*;
use crate::adapters::MapEnv;
use maplit::btreemap;
use serde_json::json;

fn vars() -> Vars {
    btreemap! {
        "x".to_string() => json!(3),
        "name".to_string() => json!("ada"),
        "items".to_string() => json!([1, 2, 3]),
        "user".to_string() => json!({"id": 7, "tags": ["a"]}),
        "empty".to_string() => json!(null),
    }
}

fn eval(text: &str) -> JsonValue {
    evaluate(text, &vars()).unwrap()
}

fn reason_of(err: EvalError) -> String {
    err.reason().to_string()
}

/* ===================== Whitelisted Constructs ===================== */

#[test]
fn test_literals_and_arithmetic() {
    assert_eq!(eval("1 + 2 * 3"), json!(7));
    assert_eq!(eval("(1 + 2) * 3"), json!(9));
    assert_eq!(eval("7 / 2"), json!(3.5));
    assert_eq!(eval("7 // 2"), json!(3));
    assert_eq!(eval("-7 // 2"), json!(-4));
    assert_eq!(eval("-7 % 3"), json!(2));
    assert_eq!(eval("2 ** 10"), json!(1024));
    assert_eq!(eval("2 ** -1"), json!(0.5));
    assert_eq!(eval("-x"), json!(-3));
    assert_eq!(eval("'a' + \"b\""), json!("ab"));
    assert_eq!(eval("'ab' * 2"), json!("abab"));
    assert_eq!(eval("[1] + [2]"), json!([1, 2]));
}

#[test]
fn test_comparisons_chain() {
    assert_eq!(eval("1 < x < 5"), json!(true));
    assert_eq!(eval("1 < x > 5"), json!(false));
    assert_eq!(eval("x == 3.0"), json!(true));
    assert_eq!(eval("x != 3"), json!(false));
    assert_eq!(eval("'d' in name"), json!(true));
    assert_eq!(eval("4 not in items"), json!(true));
    assert_eq!(eval("'id' in user"), json!(true));
    assert_eq!(eval("empty is None"), json!(true));
    assert_eq!(eval("x is not None"), json!(true));
}

#[test]
fn test_boolean_operators_return_operands() {
    assert_eq!(eval("empty or 'fallback'"), json!("fallback"));
    assert_eq!(eval("x and name"), json!("ada"));
    assert_eq!(eval("0 and undefined_name"), json!(0));
    assert_eq!(eval("not items"), json!(false));
    assert_eq!(eval("'yes' if x > 2 else 'no'"), json!("yes"));
}

#[test]
fn test_subscripts_and_displays() {
    assert_eq!(eval("items[0]"), json!(1));
    assert_eq!(eval("items[-1]"), json!(3));
    assert_eq!(eval("name[1]"), json!("d"));
    assert_eq!(eval("user['tags'][0]"), json!("a"));
    assert_eq!(eval("{'a': x, 'b': [x, 2]}"), json!({"a": 3, "b": [3, 2]}));
    assert_eq!(eval("(1, 2)"), json!([1, 2]));
}

#[test]
fn test_whitelisted_functions() {
    assert_eq!(eval("len(items)"), json!(3));
    assert_eq!(eval("len(name)"), json!(3));
    assert_eq!(eval("min(items)"), json!(1));
    assert_eq!(eval("max(4, x, 2)"), json!(4));
    assert_eq!(eval("sum(items)"), json!(6));
    assert_eq!(eval("sum(items, start=10)"), json!(16));
    assert_eq!(eval("int('42')"), json!(42));
    assert_eq!(eval("int(3.9)"), json!(3));
    assert_eq!(eval("float(x)"), json!(3.0));
    assert_eq!(eval("str(x) + '!'"), json!("3!"));
    assert_eq!(eval("str(empty)"), json!("None"));
    assert_eq!(eval("bool([])"), json!(false));
}

#[test]
fn test_condition_truthiness() {
    let vars = vars();
    assert!(evaluate_condition("x > 2", &vars).unwrap());
    assert!(evaluate_condition("items", &vars).unwrap());
    assert!(!evaluate_condition("1 == 0", &vars).unwrap());
    assert!(!evaluate_condition("''", &vars).unwrap());
}

/* ===================== Rejections ===================== */

#[test]
fn test_attribute_access_is_rejected() {
    let err = evaluate("name.upper()", &vars()).unwrap_err();
    assert!(matches!(err, EvalError::Rejected { .. }));
    assert!(reason_of(err).contains("attribute"));
}

#[test]
fn test_dunder_escape_is_rejected() {
    let err = evaluate("().__class__.__bases__", &vars()).unwrap_err();
    assert!(matches!(err, EvalError::Rejected { .. }));
}

#[test]
fn test_lambda_comprehension_and_import_are_rejected() {
    for text in [
        "lambda: 1",
        "(lambda v: v)(1)",
        "[i for i in items]",
        "{k: 1 for k in items}",
        "sum(i for i in items)",
        "import os",
        "from os import path",
    ] {
        let err = evaluate(text, &vars()).unwrap_err();
        assert!(
            matches!(err, EvalError::Rejected { .. }),
            "{} should be rejected, got {:?}",
            text,
            err
        );
    }
}

#[test]
fn test_non_whitelisted_calls_are_rejected() {
    let err = evaluate("open('/etc/passwd')", &vars()).unwrap_err();
    assert!(reason_of(err).contains("'open'"));

    let err = evaluate("__import__('os')", &vars()).unwrap_err();
    assert!(matches!(err, EvalError::Rejected { .. }));

    let err = evaluate("items[0](1)", &vars()).unwrap_err();
    assert!(matches!(err, EvalError::Rejected { .. }));
}

#[test]
fn test_rejection_happens_before_evaluation() {
    // the undefined name would fail at runtime; the attribute is found first
    let err = evaluate("missing + user.id", &vars()).unwrap_err();
    assert!(matches!(err, EvalError::Rejected { .. }));
}

#[test]
fn test_syntax_errors_are_rejected() {
    for text in ["1 +", "x ==", "(", "", "a b"] {
        let err = evaluate(text, &vars()).unwrap_err();
        assert!(matches!(err, EvalError::Rejected { .. }), "{:?}", text);
    }
}

/* ===================== Runtime Failures ===================== */

#[test]
fn test_runtime_failures() {
    let cases = [
        ("missing > 1", "name 'missing' is not defined"),
        ("1 / 0", "division by zero"),
        ("items[10]", "index out of range"),
        ("'a' < 1", "not supported"),
        ("len(x)", "has no len()"),
        ("int('abc')", "invalid literal"),
        ("user['nope']", "KeyError"),
    ];
    for (text, expected) in cases {
        let err = evaluate(text, &vars()).unwrap_err();
        assert!(matches!(err, EvalError::Failed { .. }), "{}: {:?}", text, err);
        assert!(err.reason().contains(expected), "{}: {}", text, err.reason());
    }
}

#[test]
fn test_integer_overflow_fails_cleanly() {
    let err = evaluate("9223372036854775807 + 1", &Vars::new()).unwrap_err();
    assert_eq!(err.reason(), "integer overflow");
}

#[test]
fn test_huge_repetition_fails_cleanly() {
    for text in [
        "len('abc' * 9000000000000000000)",
        "len([1, 2] * 9000000000000000000)",
        "len(2000000 * [0])",
        "len('x' * 2000000)",
    ] {
        let err = evaluate(text, &Vars::new()).unwrap_err();
        assert!(matches!(err, EvalError::Failed { .. }), "{}: {:?}", text, err);
        assert_eq!(err.reason(), "repeated sequence is too long");
    }
    assert_eq!(evaluate("len('ab' * 3)", &Vars::new()).unwrap(), json!(6));
    assert_eq!(evaluate("[0] * 3", &Vars::new()).unwrap(), json!([0, 0, 0]));
    assert_eq!(evaluate("'ab' * -1", &Vars::new()).unwrap(), json!(""));
}

/* ===================== Call Arguments ===================== */

#[test]
fn test_call_args_positional_and_keyword() {
    let env = MapEnv::default();
    let args = evaluate_call_args("\"k\", content=name, size=len(items)", &vars(), &env).unwrap();
    assert_eq!(args.positional, vec![json!("k")]);
    assert_eq!(args.keyword["content"], json!("ada"));
    assert_eq!(args.keyword["size"], json!(3));

    let named = args.named(&["key", "content"]);
    assert_eq!(named["key"], json!("k"));
    assert_eq!(named["content"], json!("ada"));
}

#[test]
fn test_call_args_empty() {
    let args = evaluate_call_args("", &Vars::new(), &MapEnv::default()).unwrap();
    assert_eq!(args, CallArgs::default());
}

#[test]
fn test_call_args_resolve_env_strings() {
    let env = MapEnv::from(btreemap! { "API_TOKEN".to_string() => "s3cr3t".to_string() });
    let args = evaluate_call_args(
        "token=\"env:API_TOKEN\", other='env:UNSET', plain='x'",
        &Vars::new(),
        &env,
    )
    .unwrap();
    assert_eq!(args.keyword["token"], json!("s3cr3t"));
    assert_eq!(args.keyword["other"], json!(""));
    assert_eq!(args.keyword["plain"], json!("x"));
}

#[test]
fn test_call_args_are_validated() {
    let err = evaluate_call_args("path=name.strip()", &vars(), &MapEnv::default()).unwrap_err();
    assert!(matches!(err, EvalError::Rejected { .. }));

    let err = evaluate_call_args("a=1, 2", &vars(), &MapEnv::default()).unwrap_err();
    assert!(reason_of(err).contains("positional argument follows keyword argument"));
}

#[test]
fn test_compile_produces_tree() {
    let expr = compile("len(items) > 0").unwrap();
    match expr {
        Expr::Compare { left, rest } => {
            assert!(matches!(*left, Expr::Call { .. }));
            assert_eq!(rest.len(), 1);
            assert_eq!(rest[0].0, CmpOp::Gt);
        }
        other => panic!("unexpected tree: {:?}", other),
    }
}
