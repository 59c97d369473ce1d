//! External collaborators of the pipeline core.
//!
//! The dispatcher reaches the outside world only through these traits:
//!
//! ```text
//! shell stage (-e)      → ShellRunner   → SystemShell (sh -c)
//! import stage (--import) → ModuleLoader → FsModuleLoader
//! --json/--yaml/--toml  → Decoder       → StructuredDecoder
//! ```
//!
//! Tests and embedders swap in their own implementations through the
//! [`Kernel`](crate::Kernel) builder methods.

mod decode;
mod loader;
mod shell;

pub use decode::StructuredDecoder;
pub use loader::FsModuleLoader;
pub use shell::{shell_escape, SystemShell};

use std::path::PathBuf;

use async_trait::async_trait;
use flowsh_types::{EvalError, Value};
use thiserror::Error;

/// Runs an expanded shell command and returns its standard output.
#[async_trait]
pub trait ShellRunner: Send + Sync {
    async fn run(&self, command: &str) -> Result<String, ShellError>;
}

/// Resolves and loads modules for the import stage.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Load `spec` (a path or bare module name). With `export`, return only
    /// that member of the loaded module.
    async fn load(&self, spec: &str, export: Option<&str>) -> Result<Value, LoadError>;
}

/// Decodes structured text into a value.
pub trait Decoder: Send + Sync {
    fn decode(&self, format: Format, text: &str) -> Result<Value, DecodeError>;
}

/// Structured text formats understood by the decode stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Toml,
}

impl Format {
    pub fn name(&self) -> &'static str {
        match self {
            Format::Json => "JSON",
            Format::Yaml => "YAML",
            Format::Toml => "TOML",
        }
    }

    /// The format implied by a file extension, if any.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            "toml" => Some(Format::Toml),
            _ => None,
        }
    }
}

/// Shell command failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShellError {
    #[error("failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("command exited with status {code}: {stderr}")]
    Exit { code: i32, stderr: String },

    #[error("command terminated by signal")]
    Signaled,
}

/// Module loading failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("module not found: {0}")]
    NotFound(String),

    #[error("io error reading {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("module {module} has no export named {export}")]
    MissingExport { module: String, export: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("module {module} failed to evaluate: {source}")]
    Evaluation { module: String, source: EvalError },
}

/// Structured text decoding failures.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {format}: {message}")]
pub struct DecodeError {
    pub format: &'static str,
    pub message: String,
}

impl DecodeError {
    pub fn new(format: Format, err: impl std::fmt::Display) -> Self {
        Self {
            format: format.name(),
            message: err.to_string(),
        }
    }
}
