//! Predicate stages: `-f` keeps matching values, `-t` stops at the first match.

use super::{index, take_expression, StageExpr};
use crate::dispatch::{DispatchState, Dispatcher};
use crate::error::DispatchError;
use crate::munch::Flag;

pub(crate) fn filter(d: &Dispatcher, state: &mut DispatchState<'_>) -> Result<(), DispatchError> {
    let source = take_expression(state, Flag::Filter.as_str(), 1)?;
    let pred = StageExpr::compile(d.runtime(), &source, &["x", "i"]);
    let env = state.env();
    state.seq = state.take_seq().filter(move |x, i| {
        let pred = pred.clone();
        let env = env.clone();
        async move { pred.test(&env, vec![x, index(i)]).await }
    });
    Ok(())
}

/// Everything before the first value whose predicate holds. Upstream is not
/// pulled past that point, so infinite producers are fine.
pub(crate) fn terminate(
    d: &Dispatcher,
    state: &mut DispatchState<'_>,
) -> Result<(), DispatchError> {
    let source = take_expression(state, Flag::Terminate.as_str(), 1)?;
    let pred = StageExpr::compile(d.runtime(), &source, &["x", "i"]);
    let env = state.env();
    state.seq = state.take_seq().take_until(move |x, i| {
        let pred = pred.clone();
        let env = env.clone();
        async move { pred.test(&env, vec![x, index(i)]).await }
    });
    Ok(())
}
