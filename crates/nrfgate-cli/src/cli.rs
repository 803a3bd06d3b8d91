//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Reusable target selection arguments
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Advertised device name to connect to, or use NRFGATE_DEVICE env var
    #[arg(short, long, env = "NRFGATE_DEVICE")]
    pub device: Option<String>,
}

#[derive(Parser)]
#[command(name = "nrfgate")]
#[command(author, version, about = "Send text messages to an NRF gateway over BLE", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Path to the configuration file
    #[arg(long, global = true, env = "NRFGATE_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan for peripherals carrying the gateway name
    Scan {
        #[command(flatten)]
        target: TargetArgs,

        /// Scan timeout in seconds (defaults to the configured scan time)
        #[arg(short, long)]
        timeout: Option<u64>,

        /// List every peripheral in range, not just the gateway
        #[arg(short, long)]
        all: bool,
    },

    /// Connect, send a message and wait until the job finishes
    Send {
        /// Message to send (at most 25 characters)
        message: String,

        #[command(flatten)]
        target: TargetArgs,

        /// Write the message once, immediately
        #[arg(long, conflicts_with_all = ["count", "interval_ms"])]
        once: bool,

        /// Number of writes (defaults to the configured repeat count)
        #[arg(short, long)]
        count: Option<u32>,

        /// Milliseconds between writes (defaults to the configured interval)
        #[arg(short, long)]
        interval_ms: Option<u64>,
    },

    /// Interactive session: connect once, send many messages
    Session {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
