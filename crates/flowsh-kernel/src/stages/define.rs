//! Binding stages: `-d NAME EXPR` and `--sub NAME ... --endsub`.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use flowsh_types::{Callable, EvalError, Value};

use super::{positional, take_expression, StageExpr};
use crate::dispatch::{ArgList, DispatchOptions, DispatchState, Dispatcher};
use crate::error::DispatchError;
use crate::item::{Item, ItemKind};
use crate::munch::Flag;
use crate::scope::Scope;
use crate::seq::Seq;

/// Evaluate once, now, and bind the result in the current frame.
pub(crate) async fn define(
    d: &Dispatcher,
    state: &mut DispatchState<'_>,
) -> Result<(), DispatchError> {
    let name = positional(state, Flag::Define, 1, "a name")?;
    let source = take_expression(state, Flag::Define.as_str(), 2)?;
    let expr = StageExpr::compile(d.runtime(), &source, &[]);
    let env = state.env();
    match expr.eval(&env, Vec::new()).await {
        Ok(value) => {
            tracing::debug!(name = %name, "defined expression");
            state.scope.set(name, value);
        }
        Err(err) => state.fail_with(Item::failed(expr.failure(err), None)),
    }
    Ok(())
}

/// Bind a callable that runs the enclosed stages. `--sub` blocks nest.
pub(crate) fn subroutine(
    d: &Dispatcher,
    state: &mut DispatchState<'_>,
) -> Result<(), DispatchError> {
    let name = positional(state, Flag::Sub, 1, "a name")?;
    let rest = state.args.rest();

    let mut depth = 1usize;
    let mut end = None;
    for (offset, token) in rest.iter().enumerate().skip(2) {
        match Flag::parse(token) {
            Some(Flag::Sub) => depth += 1,
            Some(Flag::EndSub) => {
                depth -= 1;
                if depth == 0 {
                    end = Some(offset);
                    break;
                }
            }
            _ => {}
        }
    }
    let end = end.ok_or_else(|| DispatchError::UnterminatedSubroutine(name.clone()))?;

    let body = ArgList::new(rest[2..end].to_vec());
    state.args.advance(end + 1);

    let sub = Subroutine::new(name.clone(), body, state.scope.clone(), d.clone());
    tracing::debug!(name = %name, "defined subroutine");
    state.scope.set(name, Value::Function(sub));
    Ok(())
}

/// A pipeline fragment callable from expressions.
///
/// Runs on a copy of the scope it was defined in, inside a fresh frame where
/// its own name is bound so it can call itself. The first argument becomes a
/// one-item input stream; the first output item is the return value.
pub struct Subroutine {
    name: String,
    body: ArgList,
    scope: Scope,
    dispatcher: Dispatcher,
    me: Weak<Subroutine>,
}

impl Subroutine {
    fn new(name: String, body: ArgList, scope: Scope, dispatcher: Dispatcher) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            name,
            body,
            scope,
            dispatcher,
            me: me.clone(),
        })
    }
}

#[async_trait]
impl Callable for Subroutine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, args: Vec<Value>) -> Result<Value, EvalError> {
        let input = args.into_iter().next().unwrap_or(Value::Null);
        let mut scope = self.scope.clone();
        let mut frame = scope.enter();
        if let Some(me) = self.me.upgrade() {
            frame.set(self.name.clone(), Value::Function(me));
        }

        let outcome = self
            .dispatcher
            .dispatch(
                self.body.clone(),
                &mut frame,
                Seq::from_items(vec![Item::value(input)]),
                DispatchOptions::nested(),
            )
            .await
            .map_err(|e| EvalError::Failed(format!("subroutine {}: {e}", self.name)))?;
        let first = outcome.result.first().await;
        drop(frame);

        match first.as_ref().map(Item::kind) {
            Some(ItemKind::Value(value)) => Ok(value.clone()),
            Some(ItemKind::Error(err)) => Err(EvalError::Failed(err.message.clone())),
            None => Err(EvalError::Failed(format!(
                "subroutine {} produced no value",
                self.name
            ))),
        }
    }
}
