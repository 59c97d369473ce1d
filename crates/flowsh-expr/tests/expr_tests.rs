//! End-to-end tests for the expression engine through its public interface.

use std::collections::HashMap;
use std::sync::Arc;

use flowsh_expr::ExprEngine;
use flowsh_types::{json_to_value, Bindings, EmptyBindings, EvalError, ExpressionEngine, Value};
use rstest::rstest;

fn json(text: &str) -> Value {
    json_to_value(serde_json::from_str(text).expect("valid json"))
}

async fn eval_with(
    source: &str,
    env: Arc<dyn Bindings>,
    args: Vec<Value>,
) -> Result<Value, EvalError> {
    let expr = ExprEngine::new().compile(source, &["x", "i"])?;
    expr.eval(env, args).await
}

async fn eval(source: &str, x: Value) -> Result<Value, EvalError> {
    eval_with(source, Arc::new(EmptyBindings), vec![x, Value::Int(0)]).await
}

#[rstest]
#[case("1 + 2 * 3", "7")]
#[case("(1 + 2) * 3", "9")]
#[case("2 ** 10", "1024")]
#[case("7 % 3", "1")]
#[case("10 / 4", "2.5")]
#[case("'a' + 1", "\"a1\"")]
#[case("-x", "-5")]
#[case("x > 2 ? 'big' : 'small'", "\"big\"")]
#[case("[x, x * 2]", "[5,10]")]
#[case("{ n: x, sq: x * x }", r#"{"n":5,"sq":25}"#)]
#[case("`value: ${x + 1}`", "\"value: 6\"")]
#[case("x === 5 && x !== '5'", "true")]
#[case("x == '5'", "true")]
#[case("null ?? x", "5")]
#[case("!x", "false")]
#[tokio::test]
async fn test_operators(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(eval(source, Value::Int(5)).await, Ok(json(expected)), "{source}");
}

#[rstest]
#[case("x.split(',')", r#"["a","b","c"]"#)]
#[case("x.toUpperCase()", r#""A,B,C""#)]
#[case("x.length", "5")]
#[case("x.replace(',', ';')", r#""a;b,c""#)]
#[case("x.replaceAll(',', '')", r#""abc""#)]
#[case("x.slice(-1)", r#""c""#)]
#[case("x.indexOf('b')", "2")]
#[case("x.includes('c')", "true")]
#[case("x.padStart(7, '*')", r#""**a,b,c""#)]
#[case("x.split(',').map(s => s + s).join('')", r#""aabbcc""#)]
#[tokio::test]
async fn test_string_methods(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(eval(source, "a,b,c".into()).await, Ok(json(expected)), "{source}");
}

#[rstest]
#[case("x.map(n => n * 2)", "[6,2,4]")]
#[case("x.filter(n => n > 1)", "[3,2]")]
#[case("x.reduce((a, b) => a + b, 0)", "6")]
#[case("x.reduce((a, b) => a + b)", "6")]
#[case("x.sort()", "[1,2,3]")]
#[case("x.sort((a, b) => b - a)", "[3,2,1]")]
#[case("x.some(n => n > 2)", "true")]
#[case("x.every(n => n > 2)", "false")]
#[case("x.find(n => n < 3)", "1")]
#[case("x.findIndex(n => n === 2)", "2")]
#[case("x.concat([4], 5)", "[3,1,2,4,5]")]
#[case("[[1, [2]], 3].flat()", "[1,[2],3]")]
#[case("x.map((n, i) => i)", "[0,1,2]")]
#[case("x.join('-')", r#""3-1-2""#)]
#[case("x[0]", "3")]
#[case("x[10]", "null")]
#[tokio::test]
async fn test_array_methods(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(eval(source, json("[3,1,2]")).await, Ok(json(expected)), "{source}");
}

#[rstest]
#[case("Math.max(...[1])")]
#[case("x +")]
#[case("x = 1")]
#[case("")]
#[case("'unterminated")]
fn test_syntax_errors(#[case] source: &str) {
    let result = ExprEngine::new().compile(source, &["x"]);
    assert!(matches!(result, Err(EvalError::Syntax(_))), "{source}");
}

#[tokio::test]
async fn test_method_on_number_is_type_error() {
    let err = eval("x.split(',')", Value::Int(10)).await.unwrap_err();
    assert_eq!(err, EvalError::Type("number.split is not a function".into()));
}

#[tokio::test]
async fn test_division_by_zero_is_an_error() {
    assert!(matches!(
        eval("x / 0", Value::Int(1)).await,
        Err(EvalError::Arithmetic(_))
    ));
}

#[tokio::test]
async fn test_scope_bindings_are_visible() {
    let mut scope = HashMap::new();
    scope.insert("offset".to_string(), Value::Int(100));
    let result = eval_with("x + offset", Arc::new(scope), vec![Value::Int(1)]).await;
    assert_eq!(result, Ok(Value::Int(101)));
}

#[tokio::test]
async fn test_parameters_shadow_scope() {
    let mut scope = HashMap::new();
    scope.insert("x".to_string(), Value::Int(100));
    let result = eval_with("x", Arc::new(scope), vec![Value::Int(1)]).await;
    assert_eq!(result, Ok(Value::Int(1)));
}

#[tokio::test]
async fn test_missing_arguments_are_null() {
    let expr = ExprEngine::new().compile("[x, i]", &["x", "i"]).unwrap();
    let result = expr.eval(Arc::new(EmptyBindings), vec![Value::Int(1)]).await;
    assert_eq!(result, Ok(json("[1,null]")));
}

#[tokio::test]
async fn test_function_result_is_callable_later() {
    let expr = ExprEngine::new().compile("n => n * n", &[]).unwrap();
    let square = expr.eval(Arc::new(EmptyBindings), vec![]).await.unwrap();
    assert_eq!(
        flowsh_types::call_value(&square, vec![Value::Int(9)]).await,
        Ok(Value::Int(81))
    );
}

#[tokio::test]
async fn test_template_compilation() {
    let expr = ExprEngine::new()
        .compile_template("echo ${x} ${i}", &["x", "i"])
        .unwrap();
    let result = expr
        .eval(Arc::new(EmptyBindings), vec!["hi".into(), Value::Int(3)])
        .await;
    assert_eq!(result, Ok("echo hi 3".into()));
    assert_eq!(expr.source(), "echo ${x} ${i}");
}

#[tokio::test]
async fn test_builtins_through_engine() {
    assert_eq!(eval("Math.floor(x / 2)", Value::Int(7)).await, Ok(Value::Int(3)));
    assert_eq!(eval("JSON.stringify({ a: x })", Value::Int(1)).await, Ok(r#"{"a":1}"#.into()));
    assert_eq!(eval("Object.keys({ b: 1, a: 2 })", Value::Null).await, Ok(json(r#"["a","b"]"#)));
    assert_eq!(eval("parseInt(x)", "42abc".into()).await, Ok(Value::Int(42)));
}

#[rstest]
#[case("x.repeat(1e19)")]
#[case("x.repeat(2 ** 40)")]
#[case("x.padStart(1e19)")]
#[case("x.padEnd(2 ** 40, '-')")]
#[tokio::test]
async fn test_oversized_strings_are_errors(#[case] source: &str) {
    let err = eval(source, "ab".into()).await.unwrap_err();
    assert_eq!(err, EvalError::Type("invalid string length".into()));
}

#[tokio::test]
async fn test_repeat_and_pad_within_limits() {
    assert_eq!(eval("x.repeat(3)", "ab".into()).await, Ok("ababab".into()));
    assert_eq!(eval("''.repeat(1e19)", Value::Null).await, Ok("".into()));
    assert_eq!(eval("x.padEnd(5, '-')", "ab".into()).await, Ok("ab---".into()));
}
