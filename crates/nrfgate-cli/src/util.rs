//! Utility functions for CLI operations.

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use dialoguer::{Select, theme::ColorfulTheme};
use indicatif::ProgressBar;
use tokio::sync::broadcast::error::RecvError;

use nrfgate_core::{
    BleConnector, DeviceChooser, DiscoveredDevice, EventReceiver, FindProgress, JobOutcome,
    Session, SessionEvent, StrongestSignal,
};
use nrfgate_types::Target;

use crate::config::Config;
use crate::style;

/// Picks a peripheral by prompting when several carry the target name.
///
/// Falls back to the strongest signal when stdin or stderr is not a
/// terminal. Dismissing the prompt cancels the selection.
pub struct PromptChooser {
    spinner: Option<ProgressBar>,
}

impl PromptChooser {
    pub fn new(spinner: Option<ProgressBar>) -> Self {
        Self { spinner }
    }
}

impl DeviceChooser for PromptChooser {
    fn choose(&self, candidates: &[DiscoveredDevice]) -> Option<usize> {
        if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
            return StrongestSignal.choose(candidates);
        }

        let items: Vec<String> = candidates
            .iter()
            .map(|d| format!("{} ({})", d.label(), style::format_rssi(d.rssi, true)))
            .collect();

        let prompt = || {
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Several gateways found, select one")
                .items(&items)
                .default(0)
                .interact_opt()
                .ok()
                .flatten()
        };

        match &self.spinner {
            Some(pb) => pb.suspend(prompt),
            None => prompt(),
        }
    }
}

/// Build a session talking to the gateway over BLE.
///
/// When `show_progress` is set, a spinner reports the search until the
/// returned bar is finished by the caller.
pub fn build_session(
    config: &Config,
    target: Target,
    show_progress: bool,
) -> (Session, Option<ProgressBar>) {
    let spinner = (show_progress && io::stderr().is_terminal())
        .then(|| style::connecting_spinner(&target.device_name));

    let mut connector = BleConnector::new(config.connection_config())
        .scan_options(config.scan_options())
        .chooser(Arc::new(PromptChooser::new(spinner.clone())));

    if let Some(sp) = spinner.clone() {
        connector = connector.on_progress(Box::new(move |progress: FindProgress| match progress {
            FindProgress::CacheHit => sp.set_message("Found device (cached)"),
            FindProgress::ScanAttempt {
                attempt,
                total,
                duration_secs,
            } => sp.set_message(format!(
                "Scanning for device (attempt {}/{}, {}s)...",
                attempt, total, duration_secs
            )),
            FindProgress::Found { count, .. } => {
                sp.set_message(format!("Found {} device(s), connecting...", count))
            }
        }));
    }

    let session = Session::new(Arc::new(connector), target, config.repeat);
    (session, spinner)
}

/// Connect a session, clearing the spinner either way.
pub async fn connect(session: &Session, spinner: Option<ProgressBar>) -> Result<()> {
    let result = session.connect().await;
    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }
    result.with_context(|| format!("Failed to connect to {}", session.target().device_name))
}

/// Print log entries already queued on `events` without waiting.
pub fn print_pending(events: &mut EventReceiver, quiet: bool, no_color: bool) {
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Logged { entry } = event
            && !quiet
        {
            eprintln!("{}", style::format_entry(&entry, no_color));
        }
    }
}

/// Print log entries as they arrive until `job_id` finishes.
///
/// Ctrl+C stops the job instead of killing the process, so the session can
/// still disconnect cleanly.
pub async fn follow_job(
    session: &Session,
    events: &mut EventReceiver,
    job_id: u64,
    quiet: bool,
    no_color: bool,
) -> Result<JobOutcome> {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::Logged { entry }) => {
                    if !quiet {
                        eprintln!("{}", style::format_entry(&entry, no_color));
                    }
                }
                Ok(SessionEvent::JobFinished { job_id: id, outcome }) if id == job_id => {
                    return Ok(outcome);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Skipped {} session events", skipped);
                }
                Err(RecvError::Closed) => anyhow::bail!("Session closed unexpectedly"),
            },
            _ = tokio::signal::ctrl_c() => {
                eprintln!();
                session.stop().await;
            }
        }
    }
}
