//! CLI module for delve
//!
//! Provides command-line interface parsing for the `delve` binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod output;

use crate::utils::toml_config::{ResearchMode, DEFAULT_CONFIG_FILE};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// delve - deep research from the command line
///
/// Turns a question into a research brief, delegates topics to parallel
/// researchers and synthesizes a final report.
#[derive(Parser, Debug)]
#[command(
    name = "delve",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "delve - deep research orchestration engine",
    long_about = "Turns a question into a research brief, delegates topics to parallel researcher\n\
                  agents with web search, compresses their findings and writes a report.\n\n\
                  A report is always produced, even when model calls fail or time out.",
    after_help = "EXAMPLES:\n    \
                  delve research \"How have tidal energy costs changed since 2015?\"\n    \
                  delve research --mode quick --no-clarify \"State of Rust async runtimes\"\n    \
                  delve research --json \"...\" > run.json   # Full run result as JSON\n    \
                  delve config --validate                  # Check delve.toml"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research a question and print the report
    Research {
        /// The question to research
        query: String,

        /// Research depth preset (quick, standard, deep, expert)
        #[arg(short, long)]
        mode: Option<ResearchMode>,

        /// Skip the clarifying-question stage
        #[arg(long)]
        no_clarify: bool,

        /// Print the full run result as JSON instead of the report
        #[arg(long)]
        json: bool,
    },

    /// Show configuration information
    Config {
        /// Validate the configuration file and exit
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
