//! The evaluator interface.
//!
//! The pipeline kernel never interprets expression text itself. It hands the
//! text to an [`ExpressionEngine`], gets back a compiled [`Expression`], and
//! evaluates that against a [`Bindings`] lookup plus positional arguments
//! (`x`, `i`, `acc`). Anything callable from inside an expression, including
//! pipeline subroutines, implements [`Callable`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::value::Value;

/// Errors raised while compiling or evaluating an expression.
///
/// These never abort a pipeline: the kernel turns them into error items.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("{0} is not defined")]
    Undefined(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// Raised by a callable, e.g. a subroutine whose body produced an error item.
    #[error("{0}")]
    Failed(String),
}

/// Read-only name lookup handed to the evaluator.
///
/// The kernel's scope stack implements this as a flattened view of all
/// frames, innermost first.
pub trait Bindings: Send + Sync {
    fn lookup(&self, name: &str) -> Option<Value>;
}

/// Bindings with nothing in them.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyBindings;

impl Bindings for EmptyBindings {
    fn lookup(&self, _name: &str) -> Option<Value> {
        None
    }
}

impl Bindings for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// A value that can be invoked with positional arguments.
#[async_trait]
pub trait Callable: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    async fn call(&self, args: Vec<Value>) -> Result<Value, EvalError>;
}

/// A compiled expression.
#[async_trait]
pub trait Expression: Send + Sync {
    /// The text the expression was compiled from.
    fn source(&self) -> &str;

    /// Evaluate with the given bindings. `args` line up with the parameter
    /// names given at compile time; missing trailing arguments are null.
    async fn eval(&self, env: Arc<dyn Bindings>, args: Vec<Value>) -> Result<Value, EvalError>;
}

/// Compiles expression text into [`Expression`]s.
pub trait ExpressionEngine: Send + Sync {
    /// Compile `source` as an expression taking `params` as positional inputs.
    fn compile(&self, source: &str, params: &[&str]) -> Result<Arc<dyn Expression>, EvalError>;

    /// Compile `template` as string-interpolation text: literal characters
    /// with `${expr}` holes. Used for shell command templates.
    fn compile_template(
        &self,
        template: &str,
        params: &[&str],
    ) -> Result<Arc<dyn Expression>, EvalError>;
}

/// Invoke `value` if it is callable.
pub async fn call_value(value: &Value, args: Vec<Value>) -> Result<Value, EvalError> {
    match value {
        Value::Function(func) => func.call(args).await,
        other => Err(EvalError::Type(format!("{} is not a function", other.type_name()))),
    }
}
