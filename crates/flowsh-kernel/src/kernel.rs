//! The embedding entry point.
//!
//! A [`Kernel`] owns the collaborators (expression engine, shell, module
//! loader, decoder, output sinks) and evaluates argument lists against them.
//! Each [`Kernel::evaluate`] call gets a fresh scope; nothing leaks between
//! calls.

use std::path::PathBuf;
use std::sync::Arc;

use flowsh_types::{ExpressionEngine, Value};

use crate::backend::{
    shell_escape, Decoder, FsModuleLoader, ModuleLoader, ShellRunner, StructuredDecoder,
    SystemShell,
};
use crate::dispatch::{ArgList, DispatchOptions, Dispatcher};
use crate::error::DispatchError;
use crate::item::Item;
use crate::result::PipelineResult;
use crate::scope::Scope;
use crate::seq::Seq;

/// Receives values from the log (`-l`) and write (`-w`) stages.
pub type Sink = Arc<dyn Fn(&Value) + Send + Sync>;

/// Configuration for kernel initialization.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Working directory for shell commands and relative imports.
    pub cwd: PathBuf,

    /// Program used to run `-e` commands as `<shell> -c <command>`.
    pub shell: String,

    /// Extra directories searched for bare module names.
    pub module_dirs: Vec<PathBuf>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            shell: "sh".to_string(),
            module_dirs: Vec::new(),
        }
    }
}

impl KernelConfig {
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_module_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.module_dirs.push(dir.into());
        self
    }
}

/// Everything a stage handler may call out to.
#[derive(Clone)]
pub struct Runtime {
    pub engine: Arc<dyn ExpressionEngine>,
    pub shell: Arc<dyn ShellRunner>,
    pub loader: Arc<dyn ModuleLoader>,
    pub decoder: Arc<dyn Decoder>,
    /// Applied to string payloads before they are spliced into commands.
    pub escape: fn(&str) -> String,
    pub on_log: Sink,
    pub on_write: Sink,
}

/// Evaluates pipelines.
#[derive(Clone)]
pub struct Kernel {
    runtime: Arc<Runtime>,
}

impl Kernel {
    /// A kernel with the default collaborators: the system shell, the
    /// filesystem module loader and the structured decoder. Log and write
    /// output is discarded until sinks are installed.
    pub fn new(config: KernelConfig, engine: Arc<dyn ExpressionEngine>) -> Self {
        let decoder: Arc<dyn Decoder> = Arc::new(StructuredDecoder);
        let loader = FsModuleLoader::new(
            config.cwd.clone(),
            config.module_dirs.clone(),
            engine.clone(),
            decoder.clone(),
        );
        let discard: Sink = Arc::new(|_| {});
        Self {
            runtime: Arc::new(Runtime {
                engine,
                shell: Arc::new(SystemShell::new(config.shell, config.cwd)),
                loader: Arc::new(loader),
                decoder,
                escape: shell_escape,
                on_log: discard.clone(),
                on_write: discard,
            }),
        }
    }

    fn runtime_mut(&mut self) -> &mut Runtime {
        Arc::make_mut(&mut self.runtime)
    }

    pub fn with_shell(mut self, shell: Arc<dyn ShellRunner>) -> Self {
        self.runtime_mut().shell = shell;
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.runtime_mut().loader = loader;
        self
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.runtime_mut().decoder = decoder;
        self
    }

    pub fn with_escape(mut self, escape: fn(&str) -> String) -> Self {
        self.runtime_mut().escape = escape;
        self
    }

    pub fn on_log(mut self, sink: Sink) -> Self {
        self.runtime_mut().on_log = sink;
        self
    }

    pub fn on_write(mut self, sink: Sink) -> Self {
        self.runtime_mut().on_write = sink;
        self
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Evaluate an argument list.
    ///
    /// `piped` seeds the stream with one string item per entry (stdin lines
    /// in the CLI). When it is empty the first stage produces the initial
    /// input instead.
    #[tracing::instrument(
        level = "debug",
        skip(self, args, piped),
        fields(args = args.len(), piped = piped.len())
    )]
    pub async fn evaluate(
        &self,
        args: Vec<String>,
        piped: Vec<String>,
    ) -> Result<PipelineResult, DispatchError> {
        let initial_input = piped.is_empty();
        let input = Seq::from_items(
            piped
                .into_iter()
                .map(|line| Item::value(Value::String(line)))
                .collect(),
        );
        let mut scope = Scope::new();

        Dispatcher::new(self.runtime.clone())
            .dispatch(
                ArgList::new(args),
                &mut scope,
                input,
                DispatchOptions::top_level(initial_input),
            )
            .await
    }
}
