//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::consent::Answer;

/// Report host facts to the collection server, once, with your consent.
///
/// The decision (the report or an opt-out notice) is stored in the cache
/// directory so later runs on the same OS release do not send again.
#[derive(Parser, Debug)]
#[command(name = "hostreport")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (can be repeated for more verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Read system files under this directory instead of /
    #[arg(long, global = true, hide = true)]
    pub root: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the report that would be sent, without saving or sending it
    Show,

    /// Record a decision and send it
    Send(SendArgs),

    /// Show the report, ask whether to share it, then record and send
    Interactive(DeliveryArgs),
}

/// Arguments for the send command.
#[derive(Parser, Debug)]
pub struct SendArgs {
    /// Whether to share the report
    #[arg(value_enum)]
    pub answer: AnswerArg,

    #[command(flatten)]
    pub delivery: DeliveryArgs,
}

/// Options shared by commands that store and send.
#[derive(Parser, Debug)]
pub struct DeliveryArgs {
    /// Collection server base URL
    #[arg(long)]
    pub url: Option<String>,

    /// Decide and send again even if already done for this release
    #[arg(short, long)]
    pub force: bool,
}

/// Answer argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AnswerArg {
    /// Send the report
    Yes,
    /// Send only an opt-out notice
    No,
}

impl From<AnswerArg> for Answer {
    fn from(arg: AnswerArg) -> Self {
        match arg {
            AnswerArg::Yes => Answer::Yes,
            AnswerArg::No => Answer::No,
        }
    }
}
