//! CLI argument definitions using clap
//!
//! Commands:
//! - tours serve [--port <port>]
//! - tours import --file <path>
//! - tours delete
//!
//! Every command accepts `--config <path>`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tours API server and data tools
#[derive(Parser, Debug)]
#[command(name = "tours")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the HTTP server
    Serve {
        /// Port to listen on, overriding the configuration
        #[arg(long)]
        port: Option<u16>,
    },

    /// Load tours from a JSON array file
    Import {
        /// Path to the seed file
        #[arg(long)]
        file: PathBuf,
    },

    /// Delete every tour
    Delete,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
