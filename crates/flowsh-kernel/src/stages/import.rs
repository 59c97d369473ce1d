//! Module imports, bound in the base frame.
//!
//! `-i PATH ALIAS` (or `--import`) binds the whole module.
//! `--import-from PATH EXPORT ALIAS` binds one member of it. Each flag takes
//! a fixed number of arguments, so a producer may follow either.

use super::positional;
use crate::dispatch::{DispatchState, Dispatcher};
use crate::error::DispatchError;
use crate::item::{Item, ItemError};
use crate::munch::Flag;

pub(crate) async fn whole(
    d: &Dispatcher,
    state: &mut DispatchState<'_>,
) -> Result<(), DispatchError> {
    let path = positional(state, Flag::Import, 1, "a module path and an alias")?;
    let alias = positional(state, Flag::Import, 2, "a module path and an alias")?;
    state.args.advance(3);
    bind(d, state, path, None, alias).await;
    Ok(())
}

pub(crate) async fn named(
    d: &Dispatcher,
    state: &mut DispatchState<'_>,
) -> Result<(), DispatchError> {
    let what = "a module path, an export name and an alias";
    let path = positional(state, Flag::ImportFrom, 1, what)?;
    let export = positional(state, Flag::ImportFrom, 2, what)?;
    let alias = positional(state, Flag::ImportFrom, 3, what)?;
    state.args.advance(4);
    bind(d, state, path, Some(export), alias).await;
    Ok(())
}

async fn bind(
    d: &Dispatcher,
    state: &mut DispatchState<'_>,
    path: String,
    export: Option<String>,
    alias: String,
) {
    match d.runtime().loader.load(&path, export.as_deref()).await {
        Ok(module) => {
            tracing::debug!(path = %path, alias = %alias, "imported module");
            state.scope.set_global(alias, module);
        }
        Err(err) => state.fail_with(Item::failed(
            ItemError::new(format!("Failed to import module: {path}."), err),
            None,
        )),
    }
}
