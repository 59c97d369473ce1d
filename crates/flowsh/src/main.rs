//! flowsh CLI entry point.
//!
//! Usage:
//!   flowsh '[1,2,3]' -j 'x * 2'      # Evaluate a pipeline
//!   ls | flowsh -f 'x.endsWith(".rs")'  # Stdin lines seed the stream
//!
//! Exit status is 0 on success, 1 when error items reached the output and
//! were not ignored, 2 on malformed arguments.

use std::env;
use std::io::{self, BufRead, IsTerminal, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use flowsh::{render, Config, ErrorPolicy};
use flowsh_expr::ExprEngine;
use flowsh_kernel::Kernel;
use flowsh_types::Value;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> ExitCode {
    // Respects RUST_LOG; stdout is reserved for pipeline output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args: Vec<String> = env::args().skip(1).collect();

    match args.first().map(|s| s.as_str()) {
        None | Some("--help" | "-h") => {
            print_help();
            return Ok(ExitCode::SUCCESS);
        }
        Some("--version" | "-V") => {
            println!("flowsh {}", env!("CARGO_PKG_VERSION"));
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let config = Config::load()?;
    let policy = ErrorPolicy::from_args(&args, config.print_errors);
    let cwd = env::current_dir().context("Failed to determine working directory")?;
    let piped = read_piped_stdin()?;

    let kernel = Kernel::new(config.kernel_config(cwd), Arc::new(ExprEngine::new()))
        .on_log(Arc::new(|v: &Value| println!("{v}")))
        .on_write(Arc::new(|v: &Value| {
            let mut stdout = io::stdout();
            // A closed stdout surfaces again when the result is rendered.
            let _ = write!(stdout, "{v}").and_then(|_| stdout.flush());
        }));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let result = match kernel.evaluate(args, piped).await {
            Ok(result) => result,
            Err(e) => {
                eprintln!("{e}");
                return Ok(ExitCode::from(2));
            }
        };

        let outcome = render(result, policy, &mut io::stdout(), &mut io::stderr())
            .await
            .context("Failed to write output")?;
        tracing::debug!(values = outcome.values, errors = outcome.errors, "pipeline finished");

        Ok(if outcome.failed(policy) {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        })
    })
}

/// Stdin lines, when stdin is not a terminal.
fn read_piped_stdin() -> Result<Vec<String>> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(Vec::new());
    }
    stdin
        .lock()
        .lines()
        .collect::<io::Result<Vec<_>>>()
        .context("Failed to read stdin")
}

fn print_help() {
    println!(
        r#"flowsh v{}

Usage:
  flowsh [STAGE]...
  <command> | flowsh [STAGE]...

The first stage may be a bare expression. Piped stdin lines become the
initial stream; otherwise the first stage produces it.

Stages:
  -j EXPR              Map each item (x = value, i = index)
  -f EXPR              Keep items where EXPR is truthy
  -m EXPR              Map to an array and flatten it
  -r EXPR INIT         Reduce (acc, x) starting from INIT
  -t EXPR              Stop before the first item where EXPR holds
  -a                   Collect the stream into one array
  --str                Join the stream into one string
  --json, --yaml, --toml
                       Join lines and decode
  -e TEMPLATE          Run a shell command (${{x}} interpolates the item)
  -n NAME              Tag the stream
  -s NAME              Restore a tagged value
  -c NAME,NAME         Combine tagged values into an array
  -g NAME EXPR         Re-run from tag NAME while EXPR holds
  -d NAME EXPR         Define a name for later stages
  --sub NAME ... --endsub
                       Define a subroutine callable as NAME(x)
  -i, --import PATH ALIAS
                       Bind a module
  --import-from PATH EXPORT ALIAS
                       Bind one export of a module
  -l EXPR, -w EXPR     Print EXPR with / without a newline
  -p                   Do not print the final stream
  -q TEXT              Treat the rest of the stage as a string
  --error EXPR         Replace error items with EXPR (x = the error)
  --ignoreerror        Do not report errors
  --printerror         Report errors on stdout

Options:
  -h, --help           Show this help
  -V, --version        Show version

Examples:
  flowsh '[1,2,3,4]' -f 'x % 2 === 0' -j 'x * 10'
  ls | flowsh -e 'wc -c ${{x}}'
  flowsh -e 'cat package.json' --json -j x.version
"#,
        env!("CARGO_PKG_VERSION")
    );
}
