// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the main CLI structure and subcommands for ticketflow

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ticketflow")]
#[command(about = "A staged customer-support ticket workflow engine")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,

    #[arg(long, global = true, help = "Log format (pretty or compact)")]
    pub log_format: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process tickets from a JSON or YAML file
    Run {
        #[arg(help = "Path to a ticket file (one record or a list)")]
        tickets: PathBuf,

        #[arg(short, long, help = "Write records to this file instead of stdout")]
        output: Option<String>,

        #[arg(
            long,
            requires = "output",
            help = "Treat --output as a directory and write one file per ticket"
        )]
        per_ticket: bool,

        #[arg(short, long, help = "Output format (json, pretty, yaml, text)")]
        format: Option<String>,

        #[arg(long, help = "Maximum number of tickets processed at once")]
        max_concurrent: Option<usize>,

        #[arg(long, help = "Per-ticket run timeout in seconds")]
        timeout: Option<u64>,

        #[arg(long, help = "Exit non-zero when any ticket has a failed stage")]
        strict: bool,
    },

    /// Run the sample ticket against simulated providers
    Demo {
        #[arg(long, value_enum, default_value_t = Scenario::Resolved)]
        scenario: Scenario,

        #[arg(short, long, help = "Output format (json, pretty, yaml, text)")]
        format: Option<String>,
    },

    /// Validate a ticket file without processing it
    Validate {
        #[arg(help = "Path to a ticket file (one record or a list)")]
        tickets: PathBuf,
    },

    /// List the workflow stages and their abilities
    Stages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// High confidence, no clarification
    Resolved,
    /// Low solution scores force escalation
    Escalated,
    /// Knowledge base search fails
    Degraded,
    /// A medium priority ticket asks the customer first
    Clarify,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
