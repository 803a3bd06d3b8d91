//! Human-readable activity log.
//!
//! This is what the user reads, separate from `tracing` diagnostics. Entries
//! are timestamped, newest first, and the log is bounded so a long session
//! cannot grow it without limit.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Default number of entries kept before the oldest are dropped.
pub const DEFAULT_LOG_CAPACITY: usize = 200;

/// Severity of an activity entry, used for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Neutral progress.
    Info,
    /// A milestone reached.
    Success,
    /// Something failed.
    Error,
}

/// One line of the activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was recorded (local time when available).
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    /// Entry severity.
    pub level: LogLevel,
    /// The message shown to the user.
    pub message: String,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            at: OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()),
            level,
            message: message.into(),
        }
    }

    /// Wall-clock time as `HH:MM:SS`.
    pub fn clock(&self) -> String {
        format!(
            "{:02}:{:02}:{:02}",
            self.at.hour(),
            self.at.minute(),
            self.at.second()
        )
    }
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} | {}", self.clock(), self.message)
    }
}

/// Append-only, reverse-chronological log.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl ActivityLog {
    /// Create a log keeping at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
            capacity,
        }
    }

    /// Record an entry at the front, evicting the oldest when full.
    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(entry);
    }

    /// Entries, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// The most recent entry.
    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been logged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy the entries out, newest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first() {
        let mut log = ActivityLog::default();
        log.push(LogEntry::now(LogLevel::Info, "first"));
        log.push(LogEntry::now(LogLevel::Success, "second"));

        let messages: Vec<_> = log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["second", "first"]);
        assert_eq!(log.latest().unwrap().level, LogLevel::Success);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut log = ActivityLog::with_capacity(2);
        log.push(LogEntry::now(LogLevel::Info, "a"));
        log.push(LogEntry::now(LogLevel::Info, "b"));
        log.push(LogEntry::now(LogLevel::Info, "c"));

        assert_eq!(log.len(), 2);
        let messages: Vec<_> = log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["c", "b"]);
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let mut log = ActivityLog::with_capacity(0);
        log.push(LogEntry::now(LogLevel::Info, "only"));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_entry_display_has_clock() {
        let entry = LogEntry::now(LogLevel::Error, "link lost");
        let line = entry.to_string();
        assert!(line.ends_with("| link lost"));
        assert_eq!(entry.clock().len(), 8);
    }

    #[test]
    fn test_entry_serialization() {
        let entry = LogEntry::now(LogLevel::Success, "connected");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"level\":\"success\""));
        let back: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.message, "connected");
    }
}
