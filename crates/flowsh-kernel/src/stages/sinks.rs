//! Output side effects: `-p`, `-l`, `-w`, and the error display markers.

use flowsh_types::Value;

use super::{index, take_expression, StageExpr};
use crate::dispatch::{DispatchState, Dispatcher};
use crate::error::DispatchError;
use crate::kernel::Sink;
use crate::munch::Flag;

/// `-p`: the pipeline prints for itself, so the caller should not.
pub(crate) fn print(state: &mut DispatchState<'_>) -> Result<(), DispatchError> {
    state.args.advance(1);
    state.must_print = false;
    Ok(())
}

/// `--ignoreerror` and `--printerror` only matter to the renderer.
pub(crate) fn marker(state: &mut DispatchState<'_>) -> Result<(), DispatchError> {
    state.args.advance(1);
    Ok(())
}

pub(crate) fn log(d: &Dispatcher, state: &mut DispatchState<'_>) -> Result<(), DispatchError> {
    let sink = d.runtime().on_log.clone();
    tap(d, state, Flag::Log, sink)
}

pub(crate) fn write(d: &Dispatcher, state: &mut DispatchState<'_>) -> Result<(), DispatchError> {
    let sink = d.runtime().on_write.clone();
    tap(d, state, Flag::Write, sink)
}

/// Evaluate per value and hand the result to `sink`; items pass through
/// unchanged. A failing expression sends its error message instead.
fn tap(
    d: &Dispatcher,
    state: &mut DispatchState<'_>,
    flag: Flag,
    sink: Sink,
) -> Result<(), DispatchError> {
    let source = take_expression(state, flag.as_str(), 1)?;
    let expr = StageExpr::compile(d.runtime(), &source, &["x", "i"]);
    let env = state.env();
    state.seq = state.take_seq().map_items(move |item, i| {
        let expr = expr.clone();
        let env = env.clone();
        let sink = sink.clone();
        async move {
            if let Some(x) = item.as_value().cloned() {
                match expr.apply(&env, vec![x, index(i)]).await {
                    Ok(value) => sink(&value),
                    Err(err) => sink(&Value::String(err.message)),
                }
            }
            item
        }
    });
    Ok(())
}

