//! CLI argument parsing and command execution.

mod args;
mod commands;

pub use args::{BreakpointCommands, Cli, Commands, ExportFormat, ListFormat};
pub use commands::execute;
