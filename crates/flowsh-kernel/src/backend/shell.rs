//! Shell command execution through the system shell.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::{ShellError, ShellRunner};

/// Runs commands as `<program> -c <command>` in a fixed working directory.
#[derive(Debug, Clone)]
pub struct SystemShell {
    program: String,
    cwd: PathBuf,
}

impl SystemShell {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            cwd: cwd.into(),
        }
    }
}

impl Default for SystemShell {
    fn default() -> Self {
        Self::new("sh", ".")
    }
}

#[async_trait]
impl ShellRunner for SystemShell {
    async fn run(&self, command: &str) -> Result<String, ShellError> {
        tracing::debug!(program = %self.program, command, "running shell command");

        let output = Command::new(&self.program)
            .arg("-c")
            .arg(command)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ShellError::Spawn {
                program: self.program.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
            return match output.status.code() {
                Some(code) => {
                    tracing::warn!(code, command, "shell command failed");
                    Err(ShellError::Exit { code, stderr })
                }
                None => Err(ShellError::Signaled),
            };
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Escape a string payload before it is interpolated into a command.
///
/// Everything outside `[A-Za-z0-9_-.,:/@]` and newline gets a backslash;
/// newlines are wrapped as `'\n'` so they survive as literal newlines.
pub fn shell_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\n' => out.push_str("'\n'"),
            c if c.is_ascii_alphanumeric()
                || matches!(c, '_' | '-' | '.' | ',' | ':' | '/' | '@') =>
            {
                out.push(c)
            }
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("plain-file_1.txt", "plain-file_1.txt")]
    #[case("a b", r"a\ b")]
    #[case("it's", r"it\'s")]
    #[case("$(rm -rf /)", r"\$\(rm\ -rf\ /\)")]
    #[case("user@host:/tmp,x", "user@host:/tmp,x")]
    #[case("a\nb", "a'\n'b")]
    fn test_shell_escape(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(shell_escape(input), expected);
    }

    #[tokio::test]
    async fn test_system_shell_captures_stdout() {
        let shell = SystemShell::default();
        let out = shell.run("echo hello; echo world").await.expect("echo runs");
        assert_eq!(out, "hello\nworld\n");
    }

    #[tokio::test]
    async fn test_system_shell_reports_exit_status() {
        let shell = SystemShell::default();
        let err = shell.run("echo oops >&2; exit 3").await.unwrap_err();
        assert_eq!(
            err,
            ShellError::Exit {
                code: 3,
                stderr: "oops".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_system_shell_runs_in_cwd() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("marker.txt"), "here").expect("write marker");
        let shell = SystemShell::new("sh", dir.path());
        let out = shell.run("cat marker.txt").await.expect("cat runs");
        assert_eq!(out, "here");
    }
}
