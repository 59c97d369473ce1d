//! `-r EXPR INIT`: fold the stream to a single item.
//!
//! The last munched token is the initial value; everything before it is the
//! fold expression, evaluated with `acc`, `x` and `i`.

use super::{index, StageExpr};
use crate::dispatch::{DispatchState, Dispatcher};
use crate::error::DispatchError;
use crate::item::Item;
use crate::munch::{munch, Flag};
use crate::seq::Seq;

pub(crate) fn run(d: &Dispatcher, state: &mut DispatchState<'_>) -> Result<(), DispatchError> {
    let m = munch(state.args.rest().get(1..).unwrap_or_default(), 1);
    state.args.advance(1 + m.cursor);

    let init_source = match m.others.first() {
        Some(init) if !m.expression.trim().is_empty() => init.clone(),
        _ => {
            return Err(DispatchError::MissingArgument {
                flag: Flag::Reduce.as_str(),
                what: "an expression and an initial value",
            })
        }
    };

    let fold = StageExpr::compile(d.runtime(), &m.expression, &["acc", "x", "i"]);
    let init = StageExpr::compile(d.runtime(), &init_source, &[]);
    let env = state.env();
    let upstream = state.take_seq();

    state.seq = Seq::deferred(async move {
        let seed = match init.eval(&env, Vec::new()).await {
            Ok(seed) => seed,
            Err(err) => return vec![Item::failed(init.failure(err), None)],
        };
        let folded = upstream
            .reduce(seed, move |acc, x, i| {
                let fold = fold.clone();
                let env = env.clone();
                async move { fold.apply(&env, vec![acc, x, index(i)]).await }
            })
            .await;
        vec![folded]
    });
    Ok(())
}
