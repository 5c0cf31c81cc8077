//! Lottery CLI - unified command-line interface.
//!
//! - `lottery run` - Open a window and register from the terminal
//! - `lottery serve` - Serve the HTTP endpoint
//! - `lottery check` - Validate configuration

mod args;
pub mod commands;
pub mod console;

pub use args::{CheckArgs, Cli, Commands, CommonArgs, RunArgs, ServeArgs};
