//! `-g NAME PRED`: loop an item back through a tagged section of the pipeline.
//!
//! The body is the token range from the start of the stage tagged `NAME` up
//! to this flag. For each value: while the predicate holds, run the body on a
//! one-item stream holding the current item and take its first output as
//! the new current item.
//!
//! ```text
//! checking predicate ──true──▶ running body ──▶ checking predicate
//!        │
//!      false ──▶ emit current item
//! ```

use std::sync::Arc;

use super::{index, positional, take_expression, StageExpr};
use crate::dispatch::{ArgList, DispatchOptions, DispatchState, Dispatcher};
use crate::error::{DispatchError, StageFailure};
use crate::item::{Item, ItemError};
use crate::munch::Flag;
use crate::scope::Scope;
use crate::seq::Seq;

pub(crate) fn run(d: &Dispatcher, state: &mut DispatchState<'_>) -> Result<(), DispatchError> {
    let name = positional(state, Flag::Recurse, 1, "a name")?;
    let goto_at = state.args.position();
    let source = take_expression(state, Flag::Recurse.as_str(), 2)?;

    let body = state
        .stack
        .iter()
        .rev()
        .find(|entry| entry.name == name && entry.body.shares_tokens(&state.args))
        .map(|entry| entry.body.until(goto_at));

    let Some(body) = body else {
        tracing::debug!(name = %name, "recursion target not found");
        state.seq = state.take_seq().map(move |_, _| {
            let name = name.clone();
            async move {
                Err(ItemError::new(
                    format!("The expression {name} was not found."),
                    StageFailure::RecursionTargetMissing(name),
                ))
            }
        });
        return Ok(());
    };

    let pred = StageExpr::compile(d.runtime(), &source, &["x", "i"]);
    let env = state.env();
    let d = d.clone();
    state.seq = state.take_seq().map_items(move |item, i| {
        let looper = Looper {
            dispatcher: d.clone(),
            body: body.clone(),
            pred: pred.clone(),
            env: env.clone(),
        };
        async move { looper.run(item, i).await }
    });
    Ok(())
}

struct Looper {
    dispatcher: Dispatcher,
    body: ArgList,
    pred: StageExpr,
    env: Arc<Scope>,
}

impl Looper {
    async fn run(&self, item: Item, i: usize) -> Item {
        let mut current = item;
        loop {
            let Some(payload) = current.as_value().cloned() else {
                return current;
            };
            match self.pred.test(&self.env, vec![payload, index(i)]).await {
                Ok(true) => {}
                Ok(false) => return current,
                Err(err) => return Item::failed(err, Some(&current)),
            }

            let mut scope = Scope::clone(&self.env);
            let input = Seq::from_items(vec![current.clone()]);
            let outcome = self
                .dispatcher
                .dispatch(self.body.clone(), &mut scope, input, DispatchOptions::nested())
                .await;

            let next = match outcome {
                Ok(result) => result.result.first().await,
                Err(err) => {
                    return Item::failed(
                        ItemError::new(format!("Failed to re-run {}.", self.pred.source()), err),
                        Some(&current),
                    )
                }
            };
            current = match next {
                Some(next) => next,
                None => {
                    return Item::failed(
                        ItemError::new("Recursion body produced no item.", StageFailure::EmptyBody),
                        Some(&current),
                    )
                }
            };
        }
    }
}
