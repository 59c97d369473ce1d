//! End-to-end tests for the stage catalogue.
//!
//! Argument lists are written the way a shell would split them, one token per
//! string, and run through a kernel backed by the default expression engine.

use std::sync::{Arc, Mutex};

use flowsh_expr::ExprEngine;
use flowsh_kernel::{DispatchError, Item, Kernel, KernelConfig, PipelineResult};
use flowsh_types::{json_to_value, Value};
use rstest::rstest;

fn kernel() -> Kernel {
    Kernel::new(KernelConfig::default(), Arc::new(ExprEngine::new()))
}

fn json(text: &str) -> Value {
    json_to_value(serde_json::from_str(text).expect("valid json"))
}

fn tokens(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

async fn evaluate(args: &[&str]) -> PipelineResult {
    kernel()
        .evaluate(tokens(args), Vec::new())
        .await
        .expect("pipeline parses")
}

async fn values(args: &[&str]) -> Value {
    Value::Array(evaluate(args).await.values().await)
}

async fn items(args: &[&str]) -> Vec<Item> {
    evaluate(args).await.collect().await
}

// ============================================================================
// Producers and maps
// ============================================================================

#[rstest]
#[case(&["[1,2,3]"], "[1,2,3]")]
#[case(&["42"], "[42]")]
#[case(&["[1,2,3]", "-j", "x", "*", "2"], "[2,4,6]")]
#[case(&["[1,2,3]", "-j", "x", "+", "i"], "[1,3,5]")]
#[case(&["[[1,2],[3]]", "-m", "x"], "[1,2,3]")]
#[case(&["[1,2,3,4]", "-f", "x", "%", "2", "===", "0"], "[2,4]")]
#[case(&["[1,2,3,4]", "-r", "acc", "+", "x", "0"], "[10]")]
#[case(&["[1,2,3,4]", "-t", "x>2", "-j", "x*10"], "[10,20]")]
#[case(&["[1,2,3]", "-a"], "[[1,2,3]]")]
#[case(&["[1,2,3]", "-j", "x+1", "-a", "-m", "x"], "[2,3,4]")]
#[case(&["['a','b',1]", "--str"], r#"["ab1"]"#)]
#[case(&["-q", "hello,", "world"], r#"["hello, world"]"#)]
#[case(&["-q", "hi", "-j", "x.toUpperCase()"], r#"["HI"]"#)]
#[tokio::test]
async fn test_stage_results(#[case] args: &[&str], #[case] expected: &str) {
    assert_eq!(values(args).await, json(expected), "{args:?}");
}

#[tokio::test]
async fn test_reduce_of_empty_stream_yields_seed() {
    assert_eq!(values(&["[]", "-r", "acc+x", "100"]).await, json("[100]"));
}

#[tokio::test]
async fn test_map_over_piped_lines() {
    let result = kernel()
        .evaluate(tokens(&["x.length"]), tokens(&["one", "three"]))
        .await
        .unwrap();
    assert_eq!(Value::Array(result.values().await), json("[3,5]"));
}

// ============================================================================
// Errors as items
// ============================================================================

#[tokio::test]
async fn test_failed_evaluation_becomes_error_item() {
    let out = items(&["['a,b',10,'c,d']", "-j", "x.split(',')"]).await;
    assert_eq!(out.len(), 3);
    assert_eq!(out[0].as_value(), Some(&json(r#"["a","b"]"#)));
    let err = out[1].as_error().expect("10 has no split method");
    assert_eq!(err.message, "Failed to evaluate expression: x.split(',').");
    assert_eq!(out[2].as_value(), Some(&json(r#"["c","d"]"#)));
}

#[tokio::test]
async fn test_error_recovery() {
    let out = values(&["['a,b',10,'c,d']", "-j", "x.split(',')", "--error", "'skipped'"]).await;
    assert_eq!(out, json(r#"[["a","b"],"skipped",["c","d"]]"#));
}

#[tokio::test]
async fn test_recovery_sees_message() {
    let out = values(&["[1]", "-j", "nope", "--error", "x.message"]).await;
    assert_eq!(out, json(r#"["Failed to evaluate expression: nope."]"#));
}

#[tokio::test]
async fn test_filter_keeps_errors() {
    let out = items(&["[1,'a',3]", "-j", "x", "*", "2", "-f", "x>2"]).await;
    assert_eq!(out.len(), 2);
    assert!(out[0].is_error());
    assert_eq!(out[1].as_value(), Some(&Value::Int(6)));
}

#[tokio::test]
async fn test_compile_error_marks_every_item() {
    let out = items(&["[1,2]", "-j", "x", "+"]).await;
    assert_eq!(out.len(), 2);
    assert!(out.iter().all(Item::is_error));
}

#[tokio::test]
async fn test_producer_failure_is_single_error() {
    let out = items(&["undefinedThing"]).await;
    assert_eq!(out.len(), 1);
    assert_eq!(
        out[0].as_error().map(|e| e.message.as_str()),
        Some("Failed to evaluate expression: undefinedThing.")
    );
}

#[tokio::test]
async fn test_oversized_repeat_is_error_item() {
    let out = items(&["['ab']", "-j", "x.repeat(1e19)"]).await;
    assert_eq!(out.len(), 1);
    assert_eq!(
        out[0].as_error().map(|e| e.message.as_str()),
        Some("Failed to evaluate expression: x.repeat(1e19).")
    );
}

#[tokio::test]
async fn test_to_array_keeps_error_objects() {
    let out = values(&["[1,'x']", "-j", "x", "*", "2", "-a"]).await;
    let Value::Array(outer) = out else { panic!("expected array") };
    let Value::Array(inner) = &outer[0] else { panic!("expected inner array") };
    assert_eq!(inner[0], Value::Int(2));
    let err = inner[1].as_object().expect("error object");
    assert!(err.contains_key("message"));
    assert!(err.contains_key("cause"));
}

#[tokio::test]
async fn test_to_string_stops_at_first_error() {
    let out = items(&["[1,'x',3]", "-j", "x", "*", "2", "--str"]).await;
    assert_eq!(out.len(), 1);
    assert!(out[0].is_error());
}

// ============================================================================
// Decoding
// ============================================================================

#[tokio::test]
async fn test_json_decodes_joined_lines() {
    let result = kernel()
        .evaluate(tokens(&["--json", "-j", "x.a"]), tokens(&["{\"a\":", "[1, 2]}"]))
        .await
        .unwrap();
    assert_eq!(Value::Array(result.values().await), json("[[1,2]]"));
}

#[tokio::test]
async fn test_yaml_and_toml() {
    let result = kernel()
        .evaluate(tokens(&["--yaml"]), tokens(&["name: flow", "tags: [a, b]"]))
        .await
        .unwrap();
    assert_eq!(
        Value::Array(result.values().await),
        json(r#"[{"name":"flow","tags":["a","b"]}]"#)
    );

    let result = kernel()
        .evaluate(tokens(&["--toml", "-j", "x.server.port"]), tokens(&["[server]", "port = 8080"]))
        .await
        .unwrap();
    assert_eq!(Value::Array(result.values().await), json("[8080]"));
}

#[tokio::test]
async fn test_bad_json_is_error_item() {
    let result = kernel()
        .evaluate(tokens(&["--json"]), tokens(&["{not json"]))
        .await
        .unwrap();
    let out = result.collect().await;
    assert_eq!(
        out[0].as_error().map(|e| e.message.as_str()),
        Some("Failed to parse JSON input.")
    );
}

// ============================================================================
// Tags
// ============================================================================

#[tokio::test]
async fn test_seek_restores_tagged_value() {
    let out = values(&["[1,2]", "-n", "orig", "-j", "x*10", "-s", "orig"]).await;
    assert_eq!(out, json("[1,2]"));
}

#[tokio::test]
async fn test_combine_collects_tags_in_order() {
    let out = values(&["[1,2]", "-n", "a", "-j", "x*10", "-n", "b", "-c", "b,a"]).await;
    assert_eq!(out, json("[[10,1],[20,2]]"));
}

#[tokio::test]
async fn test_seek_missing_tag_is_null() {
    let out = values(&["[1]", "-s", "nowhere"]).await;
    assert_eq!(out, json("[null]"));
}

// ============================================================================
// Sinks and definitions
// ============================================================================

#[tokio::test]
async fn test_log_and_write_sinks() {
    let logged = Arc::new(Mutex::new(Vec::new()));
    let written = Arc::new(Mutex::new(Vec::new()));
    let log_sink = logged.clone();
    let write_sink = written.clone();
    let kernel = kernel()
        .on_log(Arc::new(move |v: &Value| log_sink.lock().unwrap().push(v.clone())))
        .on_write(Arc::new(move |v: &Value| write_sink.lock().unwrap().push(v.clone())));

    let result = kernel
        .evaluate(
            tokens(&["[1,2]", "-l", "'seen '", "+", "x", "-w", "x*2", "-j", "x+1"]),
            Vec::new(),
        )
        .await
        .unwrap();
    assert!(logged.lock().unwrap().is_empty(), "sinks run only when pulled");
    assert_eq!(Value::Array(result.values().await), json("[2,3]"));
    assert_eq!(*logged.lock().unwrap(), vec![json(r#""seen 1""#), json(r#""seen 2""#)]);
    assert_eq!(*written.lock().unwrap(), vec![Value::Int(2), Value::Int(4)]);
}

#[tokio::test]
async fn test_producer_may_follow_sinks() {
    let logged = Arc::new(Mutex::new(Vec::new()));
    let log_sink = logged.clone();
    let kernel =
        kernel().on_log(Arc::new(move |v: &Value| log_sink.lock().unwrap().push(v.clone())));

    let result = kernel
        .evaluate(tokens(&["-l", "'before'", "-w", "x", "-q", "hi"]), Vec::new())
        .await
        .unwrap();
    assert_eq!(Value::Array(result.values().await), json(r#"["hi"]"#));
    assert!(logged.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_print_clears_must_print() {
    assert!(evaluate(&["[1]"]).await.must_print);
    assert!(!evaluate(&["[1]", "-p"]).await.must_print);
    assert!(!evaluate(&["-p", "[1]"]).await.must_print);
}

#[tokio::test]
async fn test_error_markers_leave_stream_alone() {
    let out = values(&["--ignoreerror", "[1,2]", "--printerror", "-j", "x"]).await;
    assert_eq!(out, json("[1,2]"));
}

#[tokio::test]
async fn test_define_binds_for_later_stages() {
    let out = values(&["-d", "k", "10", "-q", "n", "-j", "x", "+", "k"]).await;
    assert_eq!(out, json(r#"["n10"]"#));

    let out = values(&["[1,2]", "-d", "double", "n", "=>", "n", "*", "2", "-j", "double(x)"]).await;
    assert_eq!(out, json("[2,4]"));
}

#[tokio::test]
async fn test_define_failure_replaces_stream() {
    let out = items(&["[1,2]", "-d", "k", "missing"]).await;
    assert_eq!(out.len(), 1);
    assert!(out[0].is_error());
}

// ============================================================================
// Usage errors
// ============================================================================

#[rstest]
#[case(&["[1]", "x"], DispatchError::CannotParse("x".into()))]
#[case(&["[1]", "-j"], DispatchError::EmptyExpression { flag: "-j" })]
#[case(
    &["[1]", "-r", "acc+x"],
    DispatchError::MissingArgument { flag: "-r", what: "an expression and an initial value" }
)]
#[case(&["[1]", "-n"], DispatchError::MissingArgument { flag: "-n", what: "a name" })]
#[case(&["[1]", "--endsub"], DispatchError::UnexpectedEndSub)]
#[tokio::test]
async fn test_usage_errors(#[case] args: &[&str], #[case] expected: DispatchError) {
    let err = kernel().evaluate(tokens(args), Vec::new()).await.unwrap_err();
    assert_eq!(err, expected);
}

#[tokio::test]
async fn test_cannot_parse_message() {
    let err = kernel()
        .evaluate(tokens(&["[1]", "bogus"]), Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Cannot parse option bogus.");
}
