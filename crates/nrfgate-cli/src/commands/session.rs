//! Interactive session command.
//!
//! Reads commands line by line from stdin while printing activity log
//! entries as the session records them. One connection serves any number
//! of sends.

use std::time::Duration;

use anyhow::Result;
use owo_colors::OwoColorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use nrfgate_core::{Session, SessionEvent};
use nrfgate_types::{RepeatPolicy, Target};

use crate::config::Config;
use crate::style;
use crate::util::build_session;

const HELP: &str = "\
Commands:
  connect           Search for the gateway and connect
  send <message>    Send repeatedly using the configured policy
  once <message>    Send a single write immediately
  stop              Stop the active transmission
  repeat <n> <ms>   Change the count and interval used by send
  status            Show connection status and available actions
  log               Print the activity log, newest first
  disconnect        Drop the connection
  help              Show this help
  quit              Disconnect and exit";

/// A parsed input line.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Connect,
    Send(&'a str),
    Once(&'a str),
    Stop,
    Repeat(&'a str),
    Status,
    Log,
    Disconnect,
    Help,
    Quit,
    Empty,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim_end_matches(['\r', '\n']);
    let trimmed = line.trim_start();
    let (word, rest) = match trimmed.split_once(' ') {
        Some((word, rest)) => (word, rest),
        None => (trimmed, ""),
    };
    match word {
        "" => Input::Empty,
        "connect" => Input::Connect,
        "send" => Input::Send(rest),
        "once" => Input::Once(rest),
        "stop" => Input::Stop,
        "repeat" => Input::Repeat(rest),
        "status" => Input::Status,
        "log" => Input::Log,
        "disconnect" => Input::Disconnect,
        "help" | "?" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => Input::Unknown(other),
    }
}

/// Parse `<count> <interval_ms>`.
fn parse_policy(args: &str) -> Option<RepeatPolicy> {
    let mut parts = args.split_whitespace();
    let count = parts.next()?.parse().ok()?;
    let interval_ms: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(RepeatPolicy::new(count, Duration::from_millis(interval_ms)))
}

pub async fn cmd_session(config: &Config, target: Target, quiet: bool, no_color: bool) -> Result<()> {
    let (session, _) = build_session(config, target, false);
    let mut events = session.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if !quiet {
        eprintln!(
            "Interactive session for '{}'. Type 'help' for commands.",
            session.target().device_name
        );
    }

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if !handle_line(&session, &line, no_color).await {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(SessionEvent::Logged { entry }) if !quiet => {
                    eprintln!("{}", style::format_entry(&entry, no_color));
                }
                Ok(SessionEvent::JobFinished { outcome, .. }) if !quiet => {
                    eprintln!("{}", style::format_outcome(&outcome));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Skipped {} session events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                if !session.stop().await {
                    eprintln!("\nShutting down...");
                    break;
                }
            }
        }
    }

    if let Err(e) = session.disconnect().await {
        tracing::warn!("Disconnect failed: {}", e);
    }
    Ok(())
}

/// Run one input line. Returns `false` when the session should end.
async fn handle_line(session: &Session, line: &str, no_color: bool) -> bool {
    match parse_input(line) {
        Input::Connect => {
            // Failures are already in the activity log.
            if let Err(e) = session.connect().await {
                tracing::debug!("Connect failed: {}", e);
            }
        }
        Input::Send(text) => {
            if let Err(e) = session.send(text).await {
                tracing::debug!("Send rejected: {}", e);
            }
        }
        Input::Once(text) => {
            if let Err(e) = session.send_once(text).await {
                tracing::debug!("Single send failed: {}", e);
            }
        }
        Input::Stop => {
            if !session.stop().await {
                eprintln!("No transmission is running.");
            }
        }
        Input::Repeat(args) => match parse_policy(args) {
            Some(policy) => match session.set_policy(policy).await {
                Ok(()) => println!(
                    "repeat: {} times @ {}ms",
                    policy.repeat_count, policy.interval_ms
                ),
                Err(e) => eprintln!("{}", e),
            },
            None => eprintln!("Usage: repeat <count> <interval_ms>"),
        },
        Input::Status => {
            let policy = session.policy().await;
            println!(
                "{}  ({})",
                style::format_status(session.status().await, no_color),
                style::format_controls(session.controls().await, no_color)
            );
            println!(
                "repeat: {} times @ {}ms",
                policy.repeat_count, policy.interval_ms
            );
            if let Some(job) = session.active_job().await {
                println!("active job: #{}", job);
            }
        }
        Input::Log => {
            for entry in session.log_snapshot().await {
                println!("{}", style::format_entry(&entry, no_color));
            }
        }
        Input::Disconnect => {
            if let Err(e) = session.disconnect().await {
                eprintln!("Disconnect failed: {}", e);
            }
        }
        Input::Help => println!("{}", HELP),
        Input::Quit => return false,
        Input::Empty => {}
        Input::Unknown(word) => {
            if no_color {
                eprintln!("Unknown command '{}'. Type 'help' for commands.", word);
            } else {
                eprintln!(
                    "Unknown command '{}'. Type 'help' for commands.",
                    word.yellow()
                );
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_input("connect"), Input::Connect);
        assert_eq!(parse_input("stop\r\n"), Input::Stop);
        assert_eq!(parse_input("  status"), Input::Status);
        assert_eq!(parse_input("exit"), Input::Quit);
        assert_eq!(parse_input(""), Input::Empty);
        assert_eq!(parse_input("bogus arg"), Input::Unknown("bogus"));
    }

    #[test]
    fn test_message_keeps_inner_spaces() {
        assert_eq!(parse_input("send hello  world "), Input::Send("hello  world "));
        assert_eq!(parse_input("once héllo"), Input::Once("héllo"));
    }

    #[test]
    fn test_parse_repeat_policy() {
        assert_eq!(parse_input("repeat 5 250"), Input::Repeat("5 250"));
        assert_eq!(
            parse_policy("5 250"),
            Some(RepeatPolicy::new(5, Duration::from_millis(250)))
        );
        assert_eq!(parse_policy("5"), None);
        assert_eq!(parse_policy("five 250"), None);
        assert_eq!(parse_policy("5 250 1"), None);
    }

    #[test]
    fn test_send_without_text_is_empty_message() {
        assert_eq!(parse_input("send"), Input::Send(""));
    }
}
