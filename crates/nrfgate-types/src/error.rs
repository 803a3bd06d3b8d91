//! Validation errors shared by every front end.

use thiserror::Error;

/// Reasons a message or policy was rejected before reaching the transport.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// The message was empty.
    #[error("message is empty")]
    EmptyMessage,

    /// The message exceeds the gateway's payload policy.
    #[error("message is too long: {length} units (limit {limit})")]
    MessageTooLong {
        /// Length of the rejected message in UTF-16 code units.
        length: usize,
        /// The configured limit.
        limit: usize,
    },

    /// A repeat policy or target field holds an unusable value.
    #[error("invalid {field}: {reason}")]
    InvalidSetting {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ValidationError {
    /// Create an invalid setting error.
    pub fn invalid_setting(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type alias using nrfgate-types' ValidationError type.
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(ValidationError::EmptyMessage.to_string(), "message is empty");

        let err = ValidationError::MessageTooLong {
            length: 30,
            limit: 25,
        };
        assert!(err.to_string().contains("30"));
        assert!(err.to_string().contains("limit 25"));

        let err = ValidationError::invalid_setting("repeat_count", "must be > 0");
        assert_eq!(err.to_string(), "invalid repeat_count: must be > 0");
    }
}
