//! Bare expressions and `-j`.

use flowsh_types::Value;

use super::{index, take_expression, StageExpr};
use crate::dispatch::{DispatchState, Dispatcher};
use crate::error::DispatchError;
use crate::item::Item;
use crate::munch::Flag;
use crate::seq::Seq;

/// A leading non-flag token (or `-q`). On initial input it produces the
/// stream; otherwise it maps every value.
pub(crate) fn bare(d: &Dispatcher, state: &mut DispatchState<'_>) -> Result<(), DispatchError> {
    let source = take_expression(state, "expression", 0)?;
    if state.initial_input {
        produce(d, state, &source);
    } else {
        map(d, state, &source);
    }
    Ok(())
}

/// `-j EXPR`: always a per-item map.
pub(crate) fn explicit(d: &Dispatcher, state: &mut DispatchState<'_>) -> Result<(), DispatchError> {
    let source = take_expression(state, Flag::Expression.as_str(), 1)?;
    map(d, state, &source);
    Ok(())
}

/// Evaluate once with no inputs: an array becomes one item per element,
/// anything else a single item.
fn produce(d: &Dispatcher, state: &mut DispatchState<'_>, source: &str) {
    let expr = StageExpr::compile(d.runtime(), source, &[]);
    let env = state.env();
    state.seq = Seq::deferred(async move {
        match expr.eval(&env, Vec::new()).await {
            Ok(Value::Array(values)) => values.into_iter().map(Item::value).collect(),
            Ok(value) => vec![Item::value(value)],
            Err(err) => vec![Item::failed(expr.failure(err), None)],
        }
    });
}

fn map(d: &Dispatcher, state: &mut DispatchState<'_>, source: &str) {
    let expr = StageExpr::compile(d.runtime(), source, &["x", "i"]);
    let env = state.env();
    state.seq = state.take_seq().map(move |x, i| {
        let expr = expr.clone();
        let env = env.clone();
        async move { expr.apply(&env, vec![x, index(i)]).await }
    });
}
