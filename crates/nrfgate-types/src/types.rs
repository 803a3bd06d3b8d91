//! Core types for gateway messaging.

use core::fmt;
use std::time::Duration;

use bytes::Bytes;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ValidationError, ValidationResult};
use crate::uuid::{GATEWAY_NAME, GATEWAY_SERVICE, MESSAGE_CHARACTERISTIC};

/// Soft limit on message length, in UTF-16 code units.
///
/// The gateway forwards payloads over an nRF24L01 radio whose frames carry at
/// most 32 bytes. The transport does not enforce this; callers do.
pub const MAX_MESSAGE_UNITS: usize = 25;

/// The peripheral and endpoint a session talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Target {
    /// Exact advertised local name to select.
    pub device_name: String,
    /// Service that holds the message characteristic.
    pub service: Uuid,
    /// Characteristic receiving the writes.
    pub characteristic: Uuid,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            device_name: GATEWAY_NAME.to_string(),
            service: GATEWAY_SERVICE,
            characteristic: MESSAGE_CHARACTERISTIC,
        }
    }
}

impl Target {
    /// Target the default gateway under a different advertised name.
    pub fn named(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            ..Default::default()
        }
    }

    /// Whether an advertised name selects this target.
    ///
    /// Matching is exact and case-sensitive, like a Web Bluetooth name filter.
    pub fn matches_name(&self, name: &str) -> bool {
        name == self.device_name
    }

    /// Reject targets that could never match a peripheral.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.device_name.trim().is_empty() {
            return Err(ValidationError::invalid_setting(
                "device_name",
                "must not be empty",
            ));
        }
        if self.service.is_nil() {
            return Err(ValidationError::invalid_setting("service", "must not be nil"));
        }
        if self.characteristic.is_nil() {
            return Err(ValidationError::invalid_setting(
                "characteristic",
                "must not be nil",
            ));
        }
        Ok(())
    }
}

/// A validated text message ready to be written.
///
/// Construction enforces the non-empty rule and the [`MAX_MESSAGE_UNITS`]
/// limit, so holding a `Message` means no write can be rejected for its
/// content. The payload is the UTF-8 encoding of the text with no framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    text: String,
    payload: Bytes,
}

impl Message {
    /// Validate `text` against the default length limit.
    pub fn new(text: impl Into<String>) -> ValidationResult<Self> {
        Self::with_limit(text, MAX_MESSAGE_UNITS)
    }

    /// Validate `text` against a custom length limit.
    pub fn with_limit(text: impl Into<String>, limit: usize) -> ValidationResult<Self> {
        let text = text.into();
        if text.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        let length = text.encode_utf16().count();
        if length > limit {
            return Err(ValidationError::MessageTooLong { length, limit });
        }
        let payload = Bytes::copy_from_slice(text.as_bytes());
        Ok(Self { text, payload })
    }

    /// The message text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The bytes written to the characteristic.
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl TryFrom<&str> for Message {
    type Error = ValidationError;

    fn try_from(value: &str) -> ValidationResult<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for Message {
    type Error = ValidationError;

    fn try_from(value: String) -> ValidationResult<Self> {
        Self::new(value)
    }
}

/// How many times a message is written and how far apart.
///
/// Field names follow the configuration file; the camelCase spellings
/// `repeatCount` and `intervalMs` are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RepeatPolicy {
    /// Number of writes per job.
    #[cfg_attr(feature = "serde", serde(alias = "repeatCount"))]
    pub repeat_count: u32,
    /// Spacing between writes in milliseconds.
    #[cfg_attr(feature = "serde", serde(alias = "intervalMs"))]
    pub interval_ms: u64,
}

impl Default for RepeatPolicy {
    fn default() -> Self {
        Self {
            repeat_count: 20,
            interval_ms: 1000,
        }
    }
}

impl RepeatPolicy {
    /// Create a policy from a count and interval.
    pub fn new(repeat_count: u32, interval: Duration) -> Self {
        Self {
            repeat_count,
            interval_ms: interval.as_millis() as u64,
        }
    }

    /// Set the number of writes.
    #[must_use]
    pub fn repeat_count(mut self, count: u32) -> Self {
        self.repeat_count = count;
        self
    }

    /// Set the spacing between writes.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval_ms = interval.as_millis() as u64;
        self
    }

    /// The spacing between writes.
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Validate the policy and return an error if unusable.
    ///
    /// Checks that:
    /// - `repeat_count` is > 0
    /// - `interval_ms` is > 0
    pub fn validate(&self) -> ValidationResult<()> {
        if self.repeat_count == 0 {
            return Err(ValidationError::invalid_setting(
                "repeat_count",
                "must be > 0",
            ));
        }
        if self.interval_ms == 0 {
            return Err(ValidationError::invalid_setting("interval_ms", "must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_encodes_utf8() {
        let message = Message::new("hi").unwrap();
        assert_eq!(message.as_bytes(), &[0x68, 0x69]);
        assert_eq!(message.text(), "hi");
        assert_eq!(message.to_string(), "hi");
    }

    #[test]
    fn test_message_empty_rejected() {
        assert_eq!(Message::new(""), Err(ValidationError::EmptyMessage));
    }

    #[test]
    fn test_message_limit_is_inclusive() {
        let exact = "a".repeat(MAX_MESSAGE_UNITS);
        assert!(Message::new(exact).is_ok());

        let over = "a".repeat(MAX_MESSAGE_UNITS + 1);
        assert_eq!(
            Message::new(over),
            Err(ValidationError::MessageTooLong {
                length: 26,
                limit: 25
            })
        );
    }

    #[test]
    fn test_message_counts_utf16_units() {
        // Each of these is one UTF-16 unit but three UTF-8 bytes.
        let kana = "あ".repeat(25);
        let message = Message::new(kana).unwrap();
        assert_eq!(message.as_bytes().len(), 75);
        assert!(Message::new("あ".repeat(26)).is_err());

        // Astral plane characters take a surrogate pair.
        let emoji = "🔌".repeat(13);
        assert!(matches!(
            Message::new(emoji),
            Err(ValidationError::MessageTooLong { length: 26, .. })
        ));
    }

    #[test]
    fn test_message_custom_limit() {
        assert!(Message::with_limit("abcd", 3).is_err());
        assert!(Message::with_limit("abc", 3).is_ok());
    }

    #[test]
    fn test_message_try_from() {
        let message: Message = "ping".try_into().unwrap();
        assert_eq!(message.as_bytes(), b"ping");
        assert!(Message::try_from(String::new()).is_err());
    }

    #[test]
    fn test_target_defaults() {
        let target = Target::default();
        assert_eq!(target.device_name, "NRF_Gateway_A");
        assert_eq!(target.service, GATEWAY_SERVICE);
        assert_eq!(target.characteristic, MESSAGE_CHARACTERISTIC);
        assert!(target.validate().is_ok());
    }

    #[test]
    fn test_target_name_match_is_exact() {
        let target = Target::default();
        assert!(target.matches_name("NRF_Gateway_A"));
        assert!(!target.matches_name("nrf_gateway_a"));
        assert!(!target.matches_name("NRF_Gateway_A2"));
        assert!(!target.matches_name("NRF_Gateway"));
    }

    #[test]
    fn test_target_validate() {
        assert!(Target::named("  ").validate().is_err());

        let target = Target {
            characteristic: Uuid::nil(),
            ..Default::default()
        };
        assert!(target.validate().is_err());
    }

    #[test]
    fn test_repeat_policy_defaults() {
        let policy = RepeatPolicy::default();
        assert_eq!(policy.repeat_count, 20);
        assert_eq!(policy.period(), Duration::from_secs(1));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_repeat_policy_builder() {
        let policy = RepeatPolicy::default()
            .repeat_count(3)
            .interval(Duration::from_millis(100));
        assert_eq!(policy, RepeatPolicy::new(3, Duration::from_millis(100)));
    }

    #[test]
    fn test_repeat_policy_validate() {
        assert!(RepeatPolicy::default().repeat_count(0).validate().is_err());
        assert!(
            RepeatPolicy::default()
                .interval(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_repeat_policy_aliases() {
        let policy: RepeatPolicy =
            serde_json::from_str(r#"{"repeatCount": 5, "intervalMs": 250}"#).unwrap();
        assert_eq!(policy.repeat_count, 5);
        assert_eq!(policy.interval_ms, 250);

        let policy: RepeatPolicy = toml::from_str("repeat_count = 7").unwrap();
        assert_eq!(policy.repeat_count, 7);
        assert_eq!(policy.interval_ms, 1000);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_target_from_toml() {
        let target: Target = toml::from_str(r#"device_name = "NRF_Gateway_B""#).unwrap();
        assert_eq!(target.device_name, "NRF_Gateway_B");
        assert_eq!(target.service, GATEWAY_SERVICE);
    }
}

/// Property-based tests for message validation.
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Anything longer than the limit is rejected, whatever the content.
        #[test]
        fn over_limit_always_rejected(text in "\\PC{26,60}") {
            prop_assume!(text.encode_utf16().count() > MAX_MESSAGE_UNITS);
            let is_too_long = matches!(
                Message::new(text),
                Err(ValidationError::MessageTooLong { .. })
            );
            prop_assert!(is_too_long);
        }

        /// Accepted messages carry exactly their UTF-8 bytes.
        #[test]
        fn accepted_payload_is_utf8(text in "[a-zA-Z0-9 ]{1,25}") {
            let message = Message::new(text.clone()).unwrap();
            prop_assert_eq!(message.as_bytes(), text.as_bytes());
        }
    }
}
