//! Session event system.
//!
//! Front ends subscribe to [`SessionEvent`]s to drive their status display,
//! trigger availability, message input and activity log. All events are
//! serializable for logging and IPC.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::activity::LogEntry;
use crate::status::{Controls, LinkStatus};

/// Events emitted by a [`Session`](crate::Session).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SessionEvent {
    /// The connection status changed.
    StatusChanged { status: LinkStatus },
    /// Trigger availability changed.
    ControlsChanged { controls: Controls },
    /// An activity log entry was recorded.
    Logged { entry: LogEntry },
    /// A transmission job started.
    JobStarted {
        job_id: u64,
        message: String,
        total: u32,
        interval_ms: u64,
    },
    /// A write within a job succeeded.
    JobProgress { job_id: u64, sent: u32, total: u32 },
    /// A transmission job ended.
    JobFinished { job_id: u64, outcome: JobOutcome },
    /// The message input should be cleared.
    InputCleared,
}

/// How a transmission job ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
#[non_exhaustive]
pub enum JobOutcome {
    /// Every write succeeded.
    Completed { sent: u32 },
    /// The job was cancelled before finishing.
    Stopped { sent: u32, reason: StopReason },
    /// A write failed and the job halted.
    Failed { sent: u32, error: String },
}

/// Why a job was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `stop()` was called.
    Requested,
    /// A new send replaced it.
    Superseded,
    /// The link dropped.
    Disconnected,
}

/// Sender for session events.
pub type EventSender = broadcast::Sender<SessionEvent>;

/// Receiver for session events.
pub type EventReceiver = broadcast::Receiver<SessionEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: SessionEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(256)
    }
}
