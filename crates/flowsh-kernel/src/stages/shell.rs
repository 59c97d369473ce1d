//! `-e TEMPLATE`: run a shell command per item, or once to produce the stream.
//!
//! The template is interpolation text (`echo ${x}`), expanded with `x` and
//! `i`. String payloads go through the runtime's escape function first.
//! Output is split into non-empty lines: on initial input each line becomes
//! an item; per item, one line becomes a string and several become an array.

use std::sync::Arc;

use flowsh_types::Value;

use super::{index, take_expression, StageExpr};
use crate::backend::ShellRunner;
use crate::dispatch::{DispatchState, Dispatcher};
use crate::error::{DispatchError, StageFailure};
use crate::item::{Item, ItemError};
use crate::munch::Flag;
use crate::scope::Scope;
use crate::seq::Seq;

pub(crate) fn run(d: &Dispatcher, state: &mut DispatchState<'_>) -> Result<(), DispatchError> {
    let source = take_expression(state, Flag::Shell.as_str(), 1)?;
    let command = Command {
        template: StageExpr::template(d.runtime(), &source, &["x", "i"]),
        shell: d.runtime().shell.clone(),
        env: state.env(),
    };

    if state.initial_input {
        state.seq = Seq::deferred(async move {
            match command.run(Vec::new()).await {
                Ok(lines) => lines
                    .into_iter()
                    .map(|line| Item::value(Value::String(line)))
                    .collect(),
                Err(err) => vec![Item::failed(err, None)],
            }
        });
        return Ok(());
    }

    let escape = d.runtime().escape;
    state.seq = state.take_seq().map(move |x, i| {
        let command = command.clone();
        async move {
            let x = match x {
                Value::String(s) => Value::String(escape(&s)),
                other => other,
            };
            let mut lines = command.run(vec![x, index(i)]).await?;
            Ok(if lines.len() == 1 {
                Value::String(lines.remove(0))
            } else {
                Value::Array(lines.into_iter().map(Value::String).collect())
            })
        }
    });
    Ok(())
}

#[derive(Clone)]
struct Command {
    template: StageExpr,
    shell: Arc<dyn ShellRunner>,
    env: Arc<Scope>,
}

impl Command {
    async fn run(&self, args: Vec<Value>) -> Result<Vec<String>, ItemError> {
        let failed = |cause: StageFailure| {
            ItemError::new(
                format!("Failed to execute shell command: {}", self.template.source()),
                cause,
            )
        };
        let command = self
            .template
            .eval(&self.env, args)
            .await
            .map_err(|e| failed(e.into()))?;
        let stdout = self
            .shell
            .run(&command.to_string())
            .await
            .map_err(|e| failed(e.into()))?;
        Ok(stdout
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}
