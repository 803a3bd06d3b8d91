//! Send command implementation.
//!
//! Connects, starts one transmission, follows the activity log until the
//! job ends and disconnects. Ctrl+C stops the job early.

use std::time::Duration;

use anyhow::{Result, bail};
use owo_colors::OwoColorize;

use nrfgate_core::{JobOutcome, StopReason};
use nrfgate_types::{Message, RepeatPolicy, Target};

use crate::config::Config;
use crate::style;
use crate::util::{build_session, connect, follow_job, print_pending};

/// Arguments for the send command.
pub struct SendArgs {
    pub message: String,
    pub target: Target,
    pub once: bool,
    pub count: Option<u32>,
    pub interval_ms: Option<u64>,
    pub quiet: bool,
    pub no_color: bool,
}

/// Merge command-line overrides into the configured policy.
fn resolve_policy(config: &Config, count: Option<u32>, interval_ms: Option<u64>) -> RepeatPolicy {
    let mut policy = config.repeat;
    if let Some(count) = count {
        policy = policy.repeat_count(count);
    }
    if let Some(ms) = interval_ms {
        policy = policy.interval(Duration::from_millis(ms));
    }
    policy
}

pub async fn cmd_send(config: &Config, args: SendArgs) -> Result<()> {
    let SendArgs {
        message,
        target,
        once,
        count,
        interval_ms,
        quiet,
        no_color,
    } = args;

    // Fail fast, before spending seconds on a scan.
    Message::new(message.as_str())?;
    let policy = resolve_policy(config, count, interval_ms);
    if !once {
        policy.validate()?;
    }

    let (session, spinner) = build_session(config, target, !quiet);
    let mut events = session.subscribe();
    connect(&session, spinner).await?;
    print_pending(&mut events, quiet, no_color);

    let result = if once {
        let sent = session.send_once(&message).await.map_err(anyhow::Error::from);
        print_pending(&mut events, quiet, no_color);
        sent
    } else {
        match session
            .send_repeated(&message, policy.repeat_count, policy.period())
            .await
        {
            Ok(job) => follow_job(&session, &mut events, job, quiet, no_color)
                .await
                .and_then(|outcome| report(outcome, quiet, no_color)),
            Err(e) => Err(e.into()),
        }
    };

    if let Err(e) = session.disconnect().await {
        tracing::warn!("Disconnect failed: {}", e);
    }
    result
}

fn report(outcome: JobOutcome, quiet: bool, no_color: bool) -> Result<()> {
    let line = style::format_outcome(&outcome);
    match outcome {
        JobOutcome::Failed { .. }
        | JobOutcome::Stopped {
            reason: StopReason::Disconnected,
            ..
        } => bail!("{}", line),
        JobOutcome::Completed { .. } if !no_color => {
            if !quiet {
                eprintln!("{}", line.green());
            }
        }
        _ => {
            if !quiet {
                eprintln!("{}", line);
            }
        }
    }
    Ok(())
}
