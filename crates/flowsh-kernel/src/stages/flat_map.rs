//! `-m EXPR`: one output item per element of the array the expression returns.

use flowsh_types::{EvalError, Value};

use super::{index, take_expression, StageExpr};
use crate::dispatch::{DispatchState, Dispatcher};
use crate::error::DispatchError;
use crate::munch::Flag;

pub(crate) fn run(d: &Dispatcher, state: &mut DispatchState<'_>) -> Result<(), DispatchError> {
    let source = take_expression(state, Flag::FlatMap.as_str(), 1)?;
    let expr = StageExpr::compile(d.runtime(), &source, &["x", "i"]);
    let env = state.env();
    state.seq = state.take_seq().flat_map(move |x, i| {
        let expr = expr.clone();
        let env = env.clone();
        async move {
            match expr.apply(&env, vec![x, index(i)]).await? {
                Value::Array(values) => Ok(values),
                other => Err(expr.failure(EvalError::Type(format!(
                    "flat-map expression must return an array, got {}",
                    other.type_name()
                )))),
            }
        }
    });
    Ok(())
}
