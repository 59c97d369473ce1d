//! Tests for the `-e` shell stage.
//!
//! Most tests swap in a scripted shell so they do not depend on the host;
//! a couple run through the real system shell.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flowsh_expr::ExprEngine;
use flowsh_kernel::{Item, Kernel, KernelConfig, ShellError, ShellRunner};
use flowsh_types::{json_to_value, Value};

fn json(text: &str) -> Value {
    json_to_value(serde_json::from_str(text).expect("valid json"))
}

fn tokens(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Records every command and answers from a fixed script.
struct ScriptedShell {
    commands: Mutex<Vec<String>>,
    respond: fn(&str) -> Result<String, ShellError>,
}

impl ScriptedShell {
    fn new(respond: fn(&str) -> Result<String, ShellError>) -> Arc<Self> {
        Arc::new(Self {
            commands: Mutex::new(Vec::new()),
            respond,
        })
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShellRunner for ScriptedShell {
    async fn run(&self, command: &str) -> Result<String, ShellError> {
        self.commands.lock().unwrap().push(command.to_string());
        (self.respond)(command)
    }
}

/// Echoes the command back, one line per `;`-separated part.
fn echo(command: &str) -> Result<String, ShellError> {
    if command.starts_with("fail") {
        return Err(ShellError::Exit {
            code: 1,
            stderr: "boom".into(),
        });
    }
    Ok(command.split(';').map(|part| format!("{}\n", part.trim())).collect())
}

async fn run_scripted(shell: Arc<ScriptedShell>, args: &[&str], piped: &[&str]) -> Vec<Item> {
    Kernel::new(KernelConfig::default(), Arc::new(ExprEngine::new()))
        .with_shell(shell)
        .evaluate(tokens(args), tokens(piped))
        .await
        .expect("pipeline parses")
        .collect()
        .await
}

fn values(items: &[Item]) -> Value {
    Value::Array(items.iter().map(Item::to_value).collect())
}

// ============================================================================
// Scripted shell
// ============================================================================

#[tokio::test]
async fn initial_command_produces_one_item_per_line() {
    let shell = ScriptedShell::new(echo);
    let out = run_scripted(shell.clone(), &["-e", "a;", "b;", "c"], &[]).await;
    assert_eq!(values(&out), json(r#"["a","b","c"]"#));
    assert_eq!(shell.commands(), vec!["a; b; c".to_string()]);
}

#[tokio::test]
async fn per_item_commands_interpolate_and_escape() {
    let shell = ScriptedShell::new(echo);
    let out = run_scripted(shell.clone(), &["-e", "echo", "${x}"], &["a b", "c"]).await;
    assert_eq!(shell.commands(), vec![r"echo a\ b".to_string(), "echo c".to_string()]);
    assert_eq!(values(&out), json(r#"["echo a\\ b","echo c"]"#));
}

#[tokio::test]
async fn per_item_multi_line_output_becomes_array() {
    let shell = ScriptedShell::new(echo);
    let out = run_scripted(shell, &["[1]", "-e", "x", "${x};", "y"], &[]).await;
    assert_eq!(values(&out), json(r#"[["x 1","y"]]"#));
}

#[tokio::test]
async fn non_string_payloads_are_not_escaped() {
    let shell = ScriptedShell::new(echo);
    run_scripted(shell.clone(), &["[{a:1}]", "-e", "show", "${x.a}", "${i}"], &[]).await;
    assert_eq!(shell.commands(), vec!["show 1 0".to_string()]);
}

#[tokio::test]
async fn array_payloads_join_with_commas() {
    let shell = ScriptedShell::new(echo);
    let out = run_scripted(shell.clone(), &["[[1,2]]", "-e", "echo", "${x}"], &[]).await;
    assert_eq!(shell.commands(), vec!["echo 1,2".to_string()]);
    assert_eq!(values(&out), json(r#"["echo 1,2"]"#));
}

#[tokio::test]
async fn failed_command_is_error_item() {
    let shell = ScriptedShell::new(echo);
    let out = run_scripted(shell, &["['x','y']", "-e", "fail", "${x}"], &[]).await;
    assert_eq!(out.len(), 2);
    let err = out[0].as_error().expect("error item");
    assert_eq!(err.message, "Failed to execute shell command: fail ${x}");
    assert!(err.cause.to_string().contains("boom"));
}

#[tokio::test]
async fn failed_initial_command_is_single_error() {
    let shell = ScriptedShell::new(echo);
    let out = run_scripted(shell, &["-e", "fail"], &[]).await;
    assert_eq!(out.len(), 1);
    assert!(out[0].is_error());
}

#[tokio::test]
async fn custom_escape_function() {
    let shell = ScriptedShell::new(echo);
    let out = Kernel::new(KernelConfig::default(), Arc::new(ExprEngine::new()))
        .with_shell(shell.clone())
        .with_escape(|s| format!("'{s}'"))
        .evaluate(tokens(&["-e", "cat", "${x}"]), tokens(&["my file"]))
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(out.len(), 1);
    assert_eq!(shell.commands(), vec!["cat 'my file'".to_string()]);
}

// ============================================================================
// System shell
// ============================================================================

#[tokio::test]
async fn system_shell_runs_in_configured_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("marker.txt"), "").unwrap();
    let out = Kernel::new(
        KernelConfig::default().with_cwd(dir.path()),
        Arc::new(ExprEngine::new()),
    )
    .evaluate(tokens(&["-e", "ls"]), Vec::new())
    .await
    .unwrap()
    .collect()
    .await;
    assert_eq!(values(&out), json(r#"["marker.txt"]"#));
}

#[tokio::test]
async fn system_shell_maps_items() {
    let out = Kernel::new(KernelConfig::default(), Arc::new(ExprEngine::new()))
        .evaluate(tokens(&["['a','b']", "-e", "echo", "${x}${x}"]), Vec::new())
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(values(&out), json(r#"["aa","bb"]"#));
}
