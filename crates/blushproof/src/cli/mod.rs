//! Command-line interface for blushproof.
//!
//! This module provides the CLI structure for the `blushctl` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    BlushCommand, BloomCommand, CheckCommand, ConfigCommand, ConsentArg, ConsentCommand,
    ForgetCommand, MakeListCommand, StatusCommand, WhitelistCommand,
};

use crate::logging::Verbosity;

/// blushctl - Inspect and manage blushproof state
///
/// Checks hosts and search queries against the blushlist, records consent
/// decisions, and builds the lists and filters blushproof ships with.
#[derive(Debug, Parser)]
#[command(name = "blushctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decide whether a navigation would be intercepted
    Check(CheckCommand),

    /// Excuse a host or query
    #[command(subcommand)]
    Whitelist(WhitelistCommand),

    /// Add a host to the blushlist
    Blush(BlushCommand),

    /// Forget a host
    Forget(ForgetCommand),

    /// Record an answer to the consent prompt
    Consent(ConsentCommand),

    /// Show list and whitelist status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Build a shipped list from per-category domain files
    MakeList(MakeListCommand),

    /// Build or query a Bloom filter
    #[command(subcommand)]
    Bloom(BloomCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
