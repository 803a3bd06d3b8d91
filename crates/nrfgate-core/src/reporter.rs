//! The status/log sink shared by the connection manager and the
//! transmission controller.
//!
//! A [`Reporter`] mirrors what a front end displays: the activity log, the
//! link status and the trigger availability derived from it. Every change
//! is also broadcast as a [`SessionEvent`] and traced.

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::activity::{ActivityLog, LogEntry, LogLevel};
use crate::events::{EventDispatcher, EventReceiver, SessionEvent};
use crate::status::{Controls, LinkStatus};

#[derive(Debug)]
struct Display {
    log: ActivityLog,
    status: LinkStatus,
    job_active: bool,
    controls: Controls,
}

impl Display {
    /// Recompute controls, returning the new value when it changed.
    fn refresh(&mut self) -> Option<Controls> {
        let controls = Controls::for_state(self.status, self.job_active);
        if controls == self.controls {
            return None;
        }
        self.controls = controls;
        Some(controls)
    }
}

/// Shared sink for status, controls and activity entries.
#[derive(Debug)]
pub struct Reporter {
    display: Mutex<Display>,
    events: EventDispatcher,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(ActivityLog::default())
    }
}

impl Reporter {
    /// Create a reporter writing into `log`.
    pub fn new(log: ActivityLog) -> Self {
        Self {
            display: Mutex::new(Display {
                log,
                status: LinkStatus::default(),
                job_active: false,
                controls: Controls::default(),
            }),
            events: EventDispatcher::default(),
        }
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Broadcast an event without touching the display state.
    pub fn emit(&self, event: SessionEvent) {
        self.events.send(event);
    }

    /// Record an activity entry.
    pub async fn log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry::now(level, message);
        match level {
            LogLevel::Error => warn!("{}", entry.message),
            LogLevel::Info | LogLevel::Success => info!("{}", entry.message),
        }

        let mut display = self.display.lock().await;
        display.log.push(entry.clone());
        self.events.send(SessionEvent::Logged { entry });
    }

    /// Record a neutral entry.
    pub async fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message).await;
    }

    /// Record a success entry.
    pub async fn success(&self, message: impl Into<String>) {
        self.log(LogLevel::Success, message).await;
    }

    /// Record an error entry.
    pub async fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message).await;
    }

    /// Publish a new link status.
    pub async fn set_status(&self, status: LinkStatus) {
        let mut display = self.display.lock().await;
        if display.status != status {
            display.status = status;
            self.events.send(SessionEvent::StatusChanged { status });
        }
        if let Some(controls) = display.refresh() {
            self.events.send(SessionEvent::ControlsChanged { controls });
        }
    }

    /// Publish whether a transmission job occupies the send trigger.
    pub async fn set_job_active(&self, active: bool) {
        let mut display = self.display.lock().await;
        display.job_active = active;
        if let Some(controls) = display.refresh() {
            self.events.send(SessionEvent::ControlsChanged { controls });
        }
    }

    /// The displayed link status.
    pub async fn status(&self) -> LinkStatus {
        self.display.lock().await.status
    }

    /// The displayed trigger availability.
    pub async fn controls(&self) -> Controls {
        self.display.lock().await.controls
    }

    /// Copy of the activity log, newest first.
    pub async fn snapshot(&self) -> Vec<LogEntry> {
        self.display.lock().await.log.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_is_recorded_and_broadcast() {
        let reporter = Reporter::default();
        let mut rx = reporter.subscribe();

        reporter.error("Error: not connected.").await;

        let event = rx.recv().await.unwrap();
        match event {
            SessionEvent::Logged { entry } => {
                assert_eq!(entry.level, LogLevel::Error);
                assert_eq!(entry.message, "Error: not connected.");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(reporter.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_status_drives_controls() {
        let reporter = Reporter::default();
        let mut rx = reporter.subscribe();

        reporter.set_status(LinkStatus::Connected).await;
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::StatusChanged {
                status: LinkStatus::Connected
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::ControlsChanged {
                controls: Controls {
                    connect_enabled: false,
                    send_enabled: true
                }
            }
        );

        reporter.set_job_active(true).await;
        assert!(!reporter.controls().await.send_enabled);

        reporter.set_job_active(false).await;
        assert!(reporter.controls().await.send_enabled);
    }

    #[tokio::test]
    async fn test_unchanged_status_is_silent() {
        let reporter = Reporter::default();
        let mut rx = reporter.subscribe();

        reporter.set_status(LinkStatus::Disconnected).await;
        assert!(rx.try_recv().is_err());
    }
}
