//! Kernel error types.
//!
//! Two tiers: [`DispatchError`] is fatal and aborts the whole evaluation,
//! [`StageFailure`] is the cause carried inside an error item and never
//! aborts anything.

use flowsh_types::EvalError;
use thiserror::Error;

use crate::backend::{DecodeError, LoadError, ShellError};

/// Malformed stage usage. Aborts evaluation before any item is produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("Cannot parse option {0}.")]
    CannotParse(String),

    #[error("{flag} requires {what}")]
    MissingArgument { flag: &'static str, what: &'static str },

    #[error("{flag} requires an expression")]
    EmptyExpression { flag: &'static str },

    #[error("Did not find --endsub for subroutine {0}.")]
    UnterminatedSubroutine(String),

    #[error("--endsub without a matching --sub")]
    UnexpectedEndSub,
}

/// Why an item became an error item.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Evaluation(#[from] EvalError),

    #[error(transparent)]
    Command(#[from] ShellError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("The expression {0} was not found.")]
    RecursionTargetMissing(String),

    #[error("recursion body produced no item")]
    EmptyBody,

    /// A nested dispatch (recursion body) was itself malformed.
    #[error(transparent)]
    Nested(#[from] DispatchError),
}
