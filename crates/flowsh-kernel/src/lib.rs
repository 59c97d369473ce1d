//! flowsh-kernel: the pipeline evaluation core.
//!
//! This crate provides:
//!
//! - **Item**: value/error records with an `Arc`-linked provenance chain
//! - **Seq**: lazy, ordered, asynchronously produced item streams
//! - **Scope**: the frame stack behind named expressions, subroutines and imports
//! - **Munch**: splitting the argument list into per-stage expression text
//! - **Dispatch**: the flag table and the iterative stage state machine
//! - **Backend**: shell execution, module loading and structured decoding
//! - **Kernel**: the embedding entry point tying the above together
//!
//! Expression text is opaque here; it is compiled and evaluated through the
//! [`flowsh_types::ExpressionEngine`] handed to [`Kernel::new`].

pub mod backend;
pub mod dispatch;
pub mod error;
pub mod item;
pub mod kernel;
pub mod munch;
pub mod result;
pub mod scope;
pub mod seq;

mod stages;

pub use backend::{
    shell_escape, DecodeError, Decoder, Format, FsModuleLoader, LoadError, ModuleLoader,
    ShellError, ShellRunner, StructuredDecoder, SystemShell,
};
pub use dispatch::{ArgList, Dispatcher};
pub use error::{DispatchError, StageFailure};
pub use item::{Item, ItemError, ItemKind};
pub use kernel::{Kernel, KernelConfig, Runtime, Sink};
pub use munch::{munch, Flag, Munch};
pub use result::PipelineResult;
pub use scope::{FrameGuard, Scope};
pub use seq::Seq;
