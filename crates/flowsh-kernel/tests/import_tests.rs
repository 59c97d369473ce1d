//! Tests for `--import` through the filesystem module loader.

use std::path::Path;
use std::sync::Arc;

use flowsh_expr::ExprEngine;
use flowsh_kernel::{DispatchError, Item, Kernel, KernelConfig};
use flowsh_types::{json_to_value, Value};
use tempfile::TempDir;

fn json(text: &str) -> Value {
    json_to_value(serde_json::from_str(text).expect("valid json"))
}

fn tokens(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn workspace(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, contents) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }
    dir
}

async fn run_in(config: KernelConfig, args: &[&str]) -> Vec<Item> {
    Kernel::new(config, Arc::new(ExprEngine::new()))
        .evaluate(tokens(args), Vec::new())
        .await
        .expect("pipeline parses")
        .collect()
        .await
}

async fn values_in(cwd: &Path, args: &[&str]) -> Value {
    let items = run_in(KernelConfig::default().with_cwd(cwd), args).await;
    Value::Array(items.iter().map(Item::to_value).collect())
}

#[tokio::test]
async fn whole_module_is_bound_under_alias() {
    let dir = workspace(&[("m.json", r#"{"a": 5}"#)]);
    let out = values_in(dir.path(), &["[1,2]", "--import", "./m.json", "m", "-j", "x+m.a"]).await;
    assert_eq!(out, json("[6,7]"));
}

#[tokio::test]
async fn import_before_producer() {
    let dir = workspace(&[("m.json", r#"{"a": 5}"#)]);
    let out = values_in(dir.path(), &["--import", "./m.json", "m", "[1,2]", "-j", "x+m.a"]).await;
    assert_eq!(out, json("[6,7]"));

    let out = values_in(dir.path(), &["-i", "./m.json", "m", "m.a"]).await;
    assert_eq!(out, json("[5]"));
}

#[tokio::test]
async fn import_requires_path_and_alias() {
    let err = Kernel::new(KernelConfig::default(), Arc::new(ExprEngine::new()))
        .evaluate(tokens(&["--import", "./m.json"]), Vec::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DispatchError::MissingArgument {
            flag: "--import",
            what: "a module path and an alias"
        }
    );
}

#[tokio::test]
async fn named_export_before_producer() {
    let dir = workspace(&[("m.yaml", "a: [1, 2]\nb: 3\n")]);
    let out = values_in(
        dir.path(),
        &["--import-from", "./m.yaml", "a", "list", "list", "-j", "x*10"],
    )
    .await;
    assert_eq!(out, json("[10,20]"));
}

#[tokio::test]
async fn expression_module_functions_are_callable() {
    let dir = workspace(&[("lib/math.flow", "{ square: n => n * n, twice: s => s + s }")]);
    let out = values_in(
        dir.path(),
        &["[2,3]", "--import-from", "./lib/math.flow", "square", "sq", "-j", "sq(x)"],
    )
    .await;
    assert_eq!(out, json("[4,9]"));
}

#[tokio::test]
async fn bare_names_search_the_modules_directory() {
    let dir = workspace(&[("flowsh_modules/limits.toml", "max = 2\n")]);
    let out = values_in(
        dir.path(),
        &["[1,2,3]", "--import", "limits", "lim", "-f", "x", "<=", "lim.max"],
    )
    .await;
    assert_eq!(out, json("[1,2]"));
}

#[tokio::test]
async fn configured_module_directories_are_searched() {
    let dir = workspace(&[]);
    let lib = workspace(&[("greet.flow", "name => 'hello ' + name")]);
    let items = run_in(
        KernelConfig::default()
            .with_cwd(dir.path())
            .with_module_dir(lib.path()),
        &["-q", "world", "--import", "greet", "greet", "-j", "greet(x)"],
    )
    .await;
    assert_eq!(items[0].as_value(), Some(&Value::from("hello world")));
}

#[tokio::test]
async fn missing_module_is_error_item() {
    let dir = workspace(&[]);
    let items = run_in(
        KernelConfig::default().with_cwd(dir.path()),
        &["[1,2]", "--import", "./missing.json", "m", "-j", "x"],
    )
    .await;
    assert_eq!(items.len(), 1);
    let err = items[0].as_error().expect("error item");
    assert_eq!(err.message, "Failed to import module: ./missing.json.");
}

#[tokio::test]
async fn missing_export_is_error_item() {
    let dir = workspace(&[("m.json", r#"{"a": 1}"#)]);
    let items = run_in(
        KernelConfig::default().with_cwd(dir.path()),
        &["--import-from", "./m.json", "b", "m", "[1]"],
    )
    .await;
    assert_eq!(items.len(), 1);
    assert!(items[0].is_error());
}
