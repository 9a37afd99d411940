//! CLI module for the tours service
//!
//! Provides command-line interface for:
//! - serve: Run the HTTP API
//! - import: Load seed tours from a JSON file
//! - delete: Remove every tour

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{delete, import, run, run_command, serve};
pub use errors::{CliError, CliResult};
