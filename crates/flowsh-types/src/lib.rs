//! Pure data types for flowsh — values, bindings, the evaluator interface.
//!
//! This crate is a leaf dependency with no runtime and no I/O. The pipeline
//! kernel and the expression language both build on it, and neither needs to
//! know about the other.

pub mod eval;
pub mod json;
pub mod value;

// Flat re-exports for convenience
pub use eval::*;
pub use json::*;
pub use value::*;
