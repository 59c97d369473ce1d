//! `--error EXPR`: turn error items back into values.
//!
//! The expression sees the error as `x` (a `{ message, cause }` object).
//! Values pass through untouched.

use super::{index, take_expression, StageExpr};
use crate::dispatch::{DispatchState, Dispatcher};
use crate::error::DispatchError;
use crate::item::{Item, ItemError};
use crate::munch::Flag;

pub(crate) fn run(d: &Dispatcher, state: &mut DispatchState<'_>) -> Result<(), DispatchError> {
    let source = take_expression(state, Flag::Recover.as_str(), 1)?;
    let expr = StageExpr::compile(d.runtime(), &source, &["x", "i"]);
    let env = state.env();
    state.seq = state.take_seq().map_items(move |item, i| {
        let expr = expr.clone();
        let env = env.clone();
        async move {
            if !item.is_error() {
                return item;
            }
            match expr.eval(&env, vec![item.to_value(), index(i)]).await {
                Ok(value) => Item::derived(value, &item),
                Err(err) => Item::failed(
                    ItemError::new(
                        format!("Failed to evaluate error expression: {}.", expr.source()),
                        err,
                    ),
                    Some(&item),
                ),
            }
        }
    });
    Ok(())
}
