#![forbid(unsafe_code)]

//! Headless host for the Brew Logic engine.
//!
//! Loads optional TOML or JSON configuration and profile tables, replays a
//! built-in interaction script against a [`brew_runtime::Session`], and
//! reports what the engine did. Every visual and audio effect is logged
//! through `tracing`.

pub mod cli;
pub mod error;
pub mod logging;
pub mod script;

pub use cli::{run, run_from_env};
pub use error::{DemoError, Result};
