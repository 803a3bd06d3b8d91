//! Scan command implementation.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use nrfgate_core::scan;
use nrfgate_types::Target;

use crate::config::Config;
use crate::style;

pub async fn cmd_scan(
    config: &Config,
    target: Target,
    timeout: Option<u64>,
    all: bool,
    quiet: bool,
    no_color: bool,
) -> Result<()> {
    let secs = timeout.unwrap_or(config.connection.scan_secs);
    let spinner = (!quiet).then(|| style::scanning_spinner(secs));

    let mut options = config.scan_options().duration_secs(secs);
    if all {
        options = options.all_devices();
    }

    let devices = scan::scan_with_options(&target, options)
        .await
        .context("Failed to scan for devices");

    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }
    let devices = devices?;

    if devices.is_empty() {
        if all {
            println!("No devices found.");
        } else {
            println!("No device named '{}' found.", target.device_name);
        }
        if !quiet {
            eprintln!();
            eprintln!("Make sure:");
            eprintln!("  - The gateway is powered on and advertising");
            eprintln!("  - Bluetooth is enabled on this computer");
            eprintln!("  - No other central is connected to it");
        }
        return Ok(());
    }

    if !quiet {
        let count = format!("{} device(s)", devices.len());
        if no_color {
            eprintln!("Found {}:", count);
        } else {
            eprintln!("Found {}:", count.bold());
        }
    }

    for device in &devices {
        let marker = if device.advertises(&target.service) {
            " [gateway service]"
        } else {
            ""
        };
        println!(
            "{:<24} {:<40} {}{}",
            device.name.as_deref().unwrap_or("Unknown"),
            device.identifier,
            style::format_rssi(device.rssi, no_color),
            marker
        );
    }

    Ok(())
}
