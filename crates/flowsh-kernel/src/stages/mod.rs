//! Stage handlers.
//!
//! Each handler consumes its own tokens from the [`DispatchState`] and
//! replaces the sequence. Expression text is compiled once per stage; a
//! compile failure is not fatal, it surfaces as an error item for every value
//! the stage sees.

pub(crate) mod define;
pub(crate) mod expression;
pub(crate) mod filter;
pub(crate) mod flat_map;
pub(crate) mod import;
pub(crate) mod materialize;
pub(crate) mod named;
pub(crate) mod recurse;
pub(crate) mod recover;
pub(crate) mod reduce;
pub(crate) mod shell;
pub(crate) mod sinks;

use std::sync::Arc;

use flowsh_types::{EvalError, Expression, Value};

use crate::dispatch::DispatchState;
use crate::error::DispatchError;
use crate::item::ItemError;
use crate::kernel::Runtime;
use crate::munch::{munch, Flag};
use crate::scope::Scope;

/// A compiled stage expression and the text it came from.
#[derive(Clone)]
pub(crate) struct StageExpr {
    source: Arc<str>,
    compiled: Result<Arc<dyn Expression>, EvalError>,
}

impl StageExpr {
    pub(crate) fn compile(runtime: &Runtime, source: &str, params: &[&str]) -> Self {
        Self {
            source: source.into(),
            compiled: runtime.engine.compile(source, params),
        }
    }

    pub(crate) fn template(runtime: &Runtime, source: &str, params: &[&str]) -> Self {
        Self {
            source: source.into(),
            compiled: runtime.engine.compile_template(source, params),
        }
    }

    pub(crate) fn source(&self) -> &str {
        &self.source
    }

    pub(crate) async fn eval(
        &self,
        env: &Arc<Scope>,
        args: Vec<Value>,
    ) -> Result<Value, EvalError> {
        let expr = self.compiled.as_ref().map_err(Clone::clone)?;
        expr.eval(env.clone(), args).await
    }

    pub(crate) fn failure(&self, err: EvalError) -> ItemError {
        ItemError::new(format!("Failed to evaluate expression: {}.", self.source), err)
    }

    /// [`eval`](Self::eval) with the failure already shaped as an item error.
    pub(crate) async fn apply(
        &self,
        env: &Arc<Scope>,
        args: Vec<Value>,
    ) -> Result<Value, ItemError> {
        self.eval(env, args).await.map_err(|e| self.failure(e))
    }

    /// Evaluate and reduce to truthiness.
    pub(crate) async fn test(&self, env: &Arc<Scope>, args: Vec<Value>) -> Result<bool, ItemError> {
        self.apply(env, args).await.map(|v| v.is_truthy())
    }
}

/// The index argument `i`.
pub(crate) fn index(i: usize) -> Value {
    Value::Int(i as i64)
}

/// Munch the expression that follows `skip` tokens (the flag and its
/// positional arguments) and consume all of it.
pub(crate) fn take_expression(
    state: &mut DispatchState<'_>,
    flag: &'static str,
    skip: usize,
) -> Result<String, DispatchError> {
    let m = munch(state.args.rest().get(skip..).unwrap_or_default(), 0);
    state.args.advance(skip + m.cursor);
    if m.expression.trim().is_empty() {
        return Err(DispatchError::EmptyExpression { flag });
    }
    Ok(m.expression)
}

/// The positional argument at `offset`, which must not itself be a flag.
pub(crate) fn positional(
    state: &DispatchState<'_>,
    flag: Flag,
    offset: usize,
    what: &'static str,
) -> Result<String, DispatchError> {
    match state.args.get(offset) {
        Some(token) if !Flag::is_flag(token) => Ok(token.to_string()),
        _ => Err(DispatchError::MissingArgument {
            flag: flag.as_str(),
            what,
        }),
    }
}
