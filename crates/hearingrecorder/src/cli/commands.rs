//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::record::{parse_frequency_list, FrequencyResponse, TestOutcome};

/// Login command arguments.
#[derive(Debug, Args)]
pub struct LoginCommand {
    /// Email address of the account; it is created on first login
    #[arg(short, long)]
    pub email: String,
}

/// Record command arguments.
#[derive(Debug, Args)]
pub struct RecordCommand {
    /// Left ear responses, e.g. "500:y,1000:n"
    #[arg(long, value_parser = parse_ear_results, value_name = "FREQ:HEARD,...")]
    pub left: Option<EarResultsArg>,

    /// Right ear responses, e.g. "500:y,1000:n"
    #[arg(long, value_parser = parse_ear_results, value_name = "FREQ:HEARD,...")]
    pub right: Option<EarResultsArg>,

    /// Overall score
    #[arg(short, long)]
    pub score: Option<f64>,

    /// Kind of test performed (defaults to "audiometry")
    #[arg(short = 't', long = "type")]
    pub test_type: Option<String>,
}

impl RecordCommand {
    /// Build the test outcome described by the arguments.
    #[must_use]
    pub fn to_outcome(&self) -> TestOutcome {
        TestOutcome {
            left_ear: self.left.clone().map(|arg| arg.0),
            right_ear: self.right.clone().map(|arg| arg.0),
            overall_score: self.score,
            test_type: self.test_type.clone(),
        }
    }
}

/// History command arguments.
#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Maximum number of tests to show (defaults to `history.default_limit`)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Show per-frequency results
    #[arg(short, long)]
    pub detailed: bool,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// One ear's responses as given on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct EarResultsArg(pub Vec<FrequencyResponse>);

fn parse_ear_results(s: &str) -> Result<EarResultsArg, String> {
    parse_frequency_list(s)
        .map(EarResultsArg)
        .map_err(|e| e.to_string())
}
