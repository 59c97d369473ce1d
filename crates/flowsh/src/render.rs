//! Output rendering for pipeline results.
//!
//! Strings print raw, other values as compact JSON (the `Display` of
//! [`flowsh_types::Value`]).
//!
//! The stream is always drained, even when nothing is printed, so log and
//! write stages run. Values print one per line when the pipeline did not
//! handle its own output; error messages go where the [`ErrorPolicy`] says.

use std::io::{self, Write};

use flowsh_kernel::{ItemKind, PipelineResult};

/// Where error items are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    Stderr,
    Stdout,
    /// Errors are dropped and do not affect the exit status.
    Ignore,
}

impl ErrorPolicy {
    /// Pick the policy from the pipeline's marker flags. `--ignoreerror`
    /// wins over `--printerror`.
    pub fn from_args(args: &[String], print_errors: bool) -> Self {
        if args.iter().any(|a| a == "--ignoreerror") {
            ErrorPolicy::Ignore
        } else if print_errors || args.iter().any(|a| a == "--printerror") {
            ErrorPolicy::Stdout
        } else {
            ErrorPolicy::Stderr
        }
    }
}

/// What rendering saw.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub values: usize,
    pub errors: usize,
}

impl Outcome {
    /// Whether the run should exit with a failure status.
    pub fn failed(&self, policy: ErrorPolicy) -> bool {
        self.errors > 0 && policy != ErrorPolicy::Ignore
    }
}

/// Pull every item and print it.
pub async fn render<O: Write, E: Write>(
    result: PipelineResult,
    policy: ErrorPolicy,
    out: &mut O,
    err: &mut E,
) -> io::Result<Outcome> {
    let PipelineResult { must_print, result: mut seq } = result;
    let mut outcome = Outcome::default();

    while let Some(item) = seq.next().await {
        match item.kind() {
            ItemKind::Value(value) => {
                outcome.values += 1;
                if must_print {
                    writeln!(out, "{value}")?;
                }
            }
            ItemKind::Error(error) => {
                outcome.errors += 1;
                tracing::debug!(message = %error.message, cause = %error.cause, "error item");
                match policy {
                    ErrorPolicy::Stderr => writeln!(err, "{}", error.message)?,
                    ErrorPolicy::Stdout => writeln!(out, "{}", error.message)?,
                    ErrorPolicy::Ignore => {}
                }
            }
        }
    }

    out.flush()?;
    Ok(outcome)
}
