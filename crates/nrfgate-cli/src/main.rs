//! `nrfgate`: send text messages to an NRF gateway over BLE.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scan` | List peripherals carrying the gateway name |
//! | `send` | Connect, send once or repeatedly, then disconnect |
//! | `session` | Interactive session over a single connection |
//! | `config` | Show, locate or initialize the configuration file |
//! | `completions` | Generate shell completions |
//!
//! # Environment Variables
//!
//! - `NRFGATE_DEVICE`: advertised name to connect to (overridden by `--device`)
//! - `NRFGATE_CONFIG`: configuration file path
//! - `NO_COLOR`: disable colored output when set

use std::io;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod style;
mod util;

use cli::{Cli, Commands};
use commands::SendArgs;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "nrfgate", &mut io::stdout());
        return Ok(());
    }

    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config_path = Config::resolve_path(cli.config.as_deref());
    let config = Config::load(&config_path);
    let no_color = cli.no_color || config.no_color;
    let quiet = cli.quiet;

    match cli.command {
        Commands::Scan {
            target,
            timeout,
            all,
        } => {
            config.validate()?;
            let target = config.target_for(target.device.as_deref());
            commands::cmd_scan(&config, target, timeout, all, quiet, no_color).await?;
        }
        Commands::Send {
            message,
            target,
            once,
            count,
            interval_ms,
        } => {
            config.validate()?;
            let target = config.target_for(target.device.as_deref());
            commands::cmd_send(
                &config,
                SendArgs {
                    message,
                    target,
                    once,
                    count,
                    interval_ms,
                    quiet,
                    no_color,
                },
            )
            .await?;
        }
        Commands::Session { target } => {
            config.validate()?;
            let target = config.target_for(target.device.as_deref());
            commands::cmd_session(&config, target, quiet, no_color).await?;
        }
        Commands::Config { action } => {
            commands::cmd_config(action, &config_path, &config)?;
        }
        Commands::Completions { .. } => {
            // Already handled above
            unreachable!()
        }
    }

    Ok(())
}
