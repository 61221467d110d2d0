//! Library side of the `wayroute` tool
//!
//! Kept separate from `main.rs` so commands can be driven from tests.

pub mod cli;
pub mod commands;
pub mod config;
pub mod progress;

pub use cli::{Cli, Commands};
pub use commands::run;
pub use config::WayrouteConfig;
