//! Command-line interface for hearingrecorder.
//!
//! This module provides the CLI structure for the `hearrec` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, EarResultsArg, HistoryCommand, LoginCommand, RecordCommand, StatusCommand,
};

use crate::logging::Verbosity;

/// hearrec - Record and review hearing test results
///
/// Stores completed hearing tests for the signed-in user and shows the
/// most recent ones.
#[derive(Debug, Parser)]
#[command(name = "hearrec")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Session token to use instead of the saved session
    #[arg(long, global = true, value_name = "TOKEN")]
    pub session: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in, creating the account if needed
    Login(LoginCommand),

    /// Sign out and forget the saved session
    Logout,

    /// Record a completed hearing test
    Record(RecordCommand),

    /// Show the most recent hearing tests
    History(HistoryCommand),

    /// Show database and session status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
