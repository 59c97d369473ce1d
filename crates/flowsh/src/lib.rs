//! flowsh command-line front end.
//!
//! The binary hands its arguments to the kernel unchanged, seeds the stream
//! from piped stdin and renders whatever comes out. Configuration and
//! rendering live here so they can be tested without spawning a process.

pub mod config;
pub mod render;

pub use config::Config;
pub use render::{render, ErrorPolicy, Outcome};
