//! Stage dispatch — the single path from argument list to item stream.
//!
//! Dispatch is an explicit iterative state machine. Each turn looks at the
//! head token, runs the matching stage handler, and the handler rewrites the
//! [`DispatchState`] in place: it consumes its tokens and wraps the current
//! sequence in a new one. When no tokens remain the state becomes a
//! [`PipelineResult`].
//!
//! ```text
//! args ──▶ head token ──┬── flag ─────────▶ stage handler ──┐
//!                       ├── first token ──▶ bare expression ─┤
//!                       └── otherwise ────▶ CannotParse      │
//!          ▲                                                 │
//!          └──────────── remaining args, new seq ◀───────────┘
//! ```
//!
//! Nested dispatch (recursion bodies, subroutine bodies) goes through the
//! same entry point with a fresh state.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::error::DispatchError;
use crate::item::Item;
use crate::kernel::Runtime;
use crate::munch::Flag;
use crate::result::PipelineResult;
use crate::scope::Scope;
use crate::seq::Seq;
use crate::stages;

/// A shared token list and a cursor into it.
///
/// Cloning is cheap, so the tag stage can remember where a body starts and
/// the recursion stage can cut that body out later.
#[derive(Debug, Clone)]
pub struct ArgList {
    tokens: Arc<[String]>,
    pos: usize,
}

impl ArgList {
    pub fn new(tokens: Vec<String>) -> Self {
        Self {
            tokens: tokens.into(),
            pos: 0,
        }
    }

    /// Index of the head token in the underlying list.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Tokens not yet consumed.
    pub fn rest(&self) -> &[String] {
        self.tokens.get(self.pos..).unwrap_or_default()
    }

    pub fn head(&self) -> Option<&str> {
        self.get(0)
    }

    pub fn get(&self, offset: usize) -> Option<&str> {
        self.rest().get(offset).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.rest().is_empty()
    }

    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.tokens.len());
    }

    /// A cursor into the same list, positioned at `pos`.
    pub fn at(&self, pos: usize) -> ArgList {
        Self {
            tokens: self.tokens.clone(),
            pos: pos.min(self.tokens.len()),
        }
    }

    /// Whether both cursors point into the same token list.
    pub fn shares_tokens(&self, other: &ArgList) -> bool {
        Arc::ptr_eq(&self.tokens, &other.tokens)
    }

    /// A fresh list holding the tokens from the cursor up to `end` (exclusive).
    pub fn until(&self, end: usize) -> ArgList {
        let end = end.clamp(self.pos, self.tokens.len());
        ArgList::new(self.tokens[self.pos..end].to_vec())
    }
}

/// A tag recorded by `-n`, consulted by `-g`.
#[derive(Debug, Clone)]
pub(crate) struct StackEntry {
    pub name: String,
    /// Cursor at the start of the stage whose output was tagged.
    pub body: ArgList,
}

/// How a dispatch starts.
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    pub must_print: bool,
    /// Nothing was piped in, so the first stage produces the stream.
    pub initial_input: bool,
    pub first_token: bool,
}

impl DispatchOptions {
    pub fn top_level(initial_input: bool) -> Self {
        Self {
            must_print: true,
            initial_input,
            first_token: true,
        }
    }

    /// For recursion and subroutine bodies, which always run on an input stream.
    pub fn nested() -> Self {
        Self {
            must_print: true,
            initial_input: false,
            first_token: true,
        }
    }
}

/// The state a stage handler rewrites.
pub(crate) struct DispatchState<'s> {
    pub args: ArgList,
    pub scope: &'s mut Scope,
    pub seq: Seq,
    pub must_print: bool,
    pub initial_input: bool,
    pub first_token: bool,
    pub stack: Vec<StackEntry>,
    /// Start of the most recent stream-producing stage.
    pub last_stage: Option<usize>,
}

impl DispatchState<'_> {
    pub fn take_seq(&mut self) -> Seq {
        std::mem::take(&mut self.seq)
    }

    /// Snapshot of the scope for lazily evaluated expressions.
    pub fn env(&self) -> Arc<Scope> {
        Arc::new(self.scope.clone())
    }

    /// Replace the stream with a single error item.
    pub fn fail_with(&mut self, item: Item) {
        self.seq = Seq::from_items(vec![item]);
        self.initial_input = false;
    }
}

/// Runs argument lists against a [`Runtime`].
#[derive(Clone)]
pub struct Dispatcher {
    runtime: Arc<Runtime>,
}

impl Dispatcher {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Dispatch `args` over `input`.
    ///
    /// Returns a boxed future: stage handlers call back into this for nested
    /// bodies, so the future type has to be nameable.
    pub fn dispatch<'a>(
        &'a self,
        args: ArgList,
        scope: &'a mut Scope,
        input: Seq,
        options: DispatchOptions,
    ) -> BoxFuture<'a, Result<PipelineResult, DispatchError>> {
        async move {
            let mut state = DispatchState {
                args,
                scope,
                seq: input,
                must_print: options.must_print,
                initial_input: options.initial_input,
                first_token: options.first_token,
                stack: Vec::new(),
                last_stage: None,
            };

            while let Some(head) = state.args.head() {
                let start = state.args.position();
                let flag = Flag::parse(head);
                if flag.is_none() && !state.first_token {
                    return Err(DispatchError::CannotParse(head.to_string()));
                }
                tracing::debug!(stage = head, position = start, "dispatching stage");

                // A producer has no input to re-run, so it never starts a recursion body.
                let producer = state.initial_input
                    && matches!(flag, None | Some(Flag::Quote) | Some(Flag::Shell));

                self.run_stage(flag, &mut state).await?;

                if !flag.is_some_and(|f| f.is_transparent()) {
                    state.first_token = false;
                    state.initial_input = false;
                    if !producer && flag != Some(Flag::Tag) {
                        state.last_stage = Some(start);
                    }
                }
            }

            Ok(PipelineResult {
                must_print: state.must_print,
                result: state.seq,
            })
        }
        .boxed()
    }

    async fn run_stage(
        &self,
        flag: Option<Flag>,
        state: &mut DispatchState<'_>,
    ) -> Result<(), DispatchError> {
        let Some(flag) = flag else {
            return stages::expression::bare(self, state);
        };
        match flag {
            Flag::Quote => stages::expression::bare(self, state),
            Flag::Expression => stages::expression::explicit(self, state),
            Flag::Filter => stages::filter::filter(self, state),
            Flag::Terminate => stages::filter::terminate(self, state),
            Flag::FlatMap => stages::flat_map::run(self, state),
            Flag::Reduce => stages::reduce::run(self, state),
            Flag::ToArray => stages::materialize::to_array(state),
            Flag::ToString => stages::materialize::to_text(self, state, None),
            Flag::Json => stages::materialize::to_text(self, state, Some(crate::Format::Json)),
            Flag::Yaml => stages::materialize::to_text(self, state, Some(crate::Format::Yaml)),
            Flag::Toml => stages::materialize::to_text(self, state, Some(crate::Format::Toml)),
            Flag::Tag => stages::named::tag(state),
            Flag::Seek => stages::named::seek(state),
            Flag::Combine => stages::named::combine(state),
            Flag::Recurse => stages::recurse::run(self, state),
            Flag::Print => stages::sinks::print(state),
            Flag::IgnoreError | Flag::PrintError => stages::sinks::marker(state),
            Flag::Log => stages::sinks::log(self, state),
            Flag::Write => stages::sinks::write(self, state),
            Flag::Recover => stages::recover::run(self, state),
            Flag::Define => stages::define::define(self, state).await,
            Flag::Sub => stages::define::subroutine(self, state),
            Flag::EndSub => Err(DispatchError::UnexpectedEndSub),
            Flag::Shell => stages::shell::run(self, state),
            Flag::Import => stages::import::whole(self, state).await,
            Flag::ImportFrom => stages::import::named(self, state).await,
        }
    }
}
