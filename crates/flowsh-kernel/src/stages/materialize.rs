//! Stages that collapse the whole stream into one item.

use flowsh_types::Value;

use crate::backend::Format;
use crate::dispatch::{DispatchState, Dispatcher};
use crate::error::DispatchError;
use crate::item::{Item, ItemError};
use crate::seq::Seq;

/// `-a`: one array of every payload. Error items are kept in place as their
/// `{ message, cause }` objects.
pub(crate) fn to_array(state: &mut DispatchState<'_>) -> Result<(), DispatchError> {
    state.args.advance(1);
    let upstream = state.take_seq();
    state.seq = Seq::deferred(async move {
        let values = upstream.to_vec().await.iter().map(Item::to_value).collect();
        vec![Item::value(Value::Array(values))]
    });
    Ok(())
}

/// `--str` joins payload text; `--json`, `--yaml` and `--toml` join lines
/// and decode. The first error item upstream becomes the only output.
pub(crate) fn to_text(
    d: &Dispatcher,
    state: &mut DispatchState<'_>,
    format: Option<Format>,
) -> Result<(), DispatchError> {
    state.args.advance(1);
    let decoder = d.runtime().decoder.clone();
    let upstream = state.take_seq();
    state.seq = Seq::deferred(async move {
        let mut parts = Vec::new();
        for item in upstream.to_vec().await {
            match item.as_value() {
                Some(value) => parts.push(value.to_string()),
                None => return vec![item],
            }
        }
        let item = match format {
            None => Item::value(Value::String(parts.concat())),
            Some(format) => match decoder.decode(format, &parts.join("\n")) {
                Ok(value) => Item::value(value),
                Err(err) => Item::failed(
                    ItemError::new(format!("Failed to parse {} input.", format.name()), err),
                    None,
                ),
            },
        };
        vec![item]
    });
    Ok(())
}
