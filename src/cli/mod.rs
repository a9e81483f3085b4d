//! CLI module for Operator
//!
//! Provides command-line interface parsing for the operator-server binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Operator - agent registry and task dispatch server
#[derive(Parser, Debug)]
#[command(
    name = "operator-server",
    version,
    about = "Operator - agent registry and task dispatch server",
    long_about = "Registers typed agents, assigns them tasks and dispatches the work to an\n\
                  OpenAI-compatible inference service or a web extraction pipeline.\n\n\
                  Run without arguments to start the server.",
    after_help = "EXAMPLES:\n    \
                  operator-server                                # Start the server (reads operator.toml)\n    \
                  operator-server --config my.toml               # Use a custom config file\n    \
                  operator-server extract https://example.com    # Extract from a page and print JSON\n    \
                  operator-server config --validate              # Check the configuration"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "operator.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the batch extraction over one or more URLs and print the result as JSON
    Extract {
        /// Pages to extract from, in output order
        #[arg(required = true, num_args = 1..)]
        urls: Vec<String>,

        /// Data points to record in the result metadata
        #[arg(short = 'd', long = "data-point")]
        data_points: Vec<String>,

        /// Include the fetched HTML in the result
        #[arg(long)]
        preserve_html: bool,
    },

    /// Show configuration information
    Config {
        /// Print the full effective configuration as TOML
        #[arg(short = 'f', long)]
        full: bool,

        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
