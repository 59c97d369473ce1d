//! Naming stages: `-n` tags items, `-s` and `-c` read tags back from the
//! provenance chain.

use futures::future;

use flowsh_types::Value;

use super::positional;
use crate::dispatch::{DispatchState, StackEntry};
use crate::error::DispatchError;
use crate::item::Item;
use crate::munch::Flag;

/// `-n NAME`. Also records where the tagged stage began so `-g NAME` can
/// re-run it.
pub(crate) fn tag(state: &mut DispatchState<'_>) -> Result<(), DispatchError> {
    let name = positional(state, Flag::Tag, 1, "a name")?;
    let tag_start = state.args.position();
    state.args.advance(2);

    let start = state.last_stage.unwrap_or(tag_start);
    state.stack.push(StackEntry {
        name: name.clone(),
        body: state.args.at(start),
    });

    state.seq = state
        .take_seq()
        .map_items(move |item, _| future::ready(item.tagged(&name)));
    Ok(())
}

/// `-s NAME`: replace every payload with the tagged value.
pub(crate) fn seek(state: &mut DispatchState<'_>) -> Result<(), DispatchError> {
    let name = positional(state, Flag::Seek, 1, "a name")?;
    state.args.advance(2);
    state.seq = state
        .take_seq()
        .map_items(move |item, _| future::ready(Item::derived(item.lookup(&name), &item)));
    Ok(())
}

/// `-c A,B,...`: replace every payload with the array of tagged values.
pub(crate) fn combine(state: &mut DispatchState<'_>) -> Result<(), DispatchError> {
    let list = positional(state, Flag::Combine, 1, "a comma-separated list of names")?;
    state.args.advance(2);
    let names: Vec<String> = list
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    state.seq = state.take_seq().map_items(move |item, _| {
        let found = names.iter().map(|name| item.lookup(name)).collect();
        future::ready(Item::derived(Value::Array(found), &item))
    });
    Ok(())
}
