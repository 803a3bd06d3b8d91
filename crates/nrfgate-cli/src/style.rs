//! Visual styling utilities for the CLI.
//!
//! Spinners for scanning and connecting, plus colored rendering of
//! activity log entries and the connection status.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use nrfgate_core::{Controls, JobOutcome, LinkStatus, LogEntry, LogLevel, StopReason};

/// Standard spinner tick characters (Braille dots animation)
const SPINNER_TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Standard spinner tick interval
const SPINNER_TICK_MS: u64 = 80;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(SPINNER_TICK_CHARS)
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    pb
}

/// Create a spinner for scanning operations.
pub fn scanning_spinner(timeout_secs: u64) -> ProgressBar {
    spinner(format!("Scanning for devices... ({}s)", timeout_secs))
}

/// Create a spinner for connecting to the gateway.
pub fn connecting_spinner(device: &str) -> ProgressBar {
    spinner(format!("Connecting to {}...", device))
}

/// Format one activity log line, colored by level.
pub fn format_entry(entry: &LogEntry, no_color: bool) -> String {
    let clock = entry.clock();
    if no_color {
        return format!("{} | {}", clock, entry.message);
    }
    let message = match entry.level {
        LogLevel::Info => entry.message.to_string(),
        LogLevel::Success => format!("{}", entry.message.green()),
        LogLevel::Error => format!("{}", entry.message.red()),
    };
    format!("{} | {}", clock.dimmed(), message)
}

/// Format the two-state status label.
pub fn format_status(status: LinkStatus, no_color: bool) -> String {
    let label = match status {
        LinkStatus::Connecting => "connecting...",
        other => other.label(),
    };
    if no_color {
        return label.to_string();
    }
    if status.is_connected() {
        format!("{}", label.green().bold())
    } else {
        format!("{}", label.red())
    }
}

/// Format trigger availability, e.g. `connect: off  send: on`.
pub fn format_controls(controls: Controls, no_color: bool) -> String {
    let flag = |on: bool| -> String {
        match (on, no_color) {
            (true, true) => "on".to_string(),
            (false, true) => "off".to_string(),
            (true, false) => format!("{}", "on".green()),
            (false, false) => format!("{}", "off".dimmed()),
        }
    };
    format!(
        "connect: {}  send: {}",
        flag(controls.connect_enabled),
        flag(controls.send_enabled)
    )
}

/// One-line summary of how a job ended.
pub fn format_outcome(outcome: &JobOutcome) -> String {
    match outcome {
        JobOutcome::Completed { sent } => format!("Sent {} time(s).", sent),
        JobOutcome::Stopped { sent, reason } => {
            let why = match reason {
                StopReason::Requested => "stopped by user",
                StopReason::Superseded => "replaced by a new send",
                StopReason::Disconnected => "device disconnected",
            };
            format!("Stopped after {} write(s): {}.", sent, why)
        }
        JobOutcome::Failed { sent, error } => {
            format!("Failed after {} write(s): {}", sent, error)
        }
        _ => "Transmission ended.".to_string(),
    }
}

/// Format a signal strength as a short bar.
pub fn format_rssi(rssi: Option<i16>, no_color: bool) -> String {
    let Some(rssi) = rssi else {
        return "  -".to_string();
    };
    let bars = match rssi {
        r if r >= -60 => "▂▄▆█",
        r if r >= -70 => "▂▄▆ ",
        r if r >= -80 => "▂▄  ",
        _ => "▂   ",
    };
    if no_color {
        format!("{} {} dBm", bars, rssi)
    } else if rssi >= -70 {
        format!("{} {} dBm", bars.green(), rssi)
    } else {
        format!("{} {} dBm", bars.yellow(), rssi)
    }
}
