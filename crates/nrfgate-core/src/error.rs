//! Error types for nrfgate-core.
//!
//! Every failure a session can hit maps to one variant here. The session
//! catches each error at the boundary of the operation that raised it, logs
//! it to the activity log and converts it into a status change; the error is
//! still returned so callers can decide on an exit code.
//!
//! | Error | Raised by | Session effect |
//! |-------|-----------|----------------|
//! | [`Error::Selection`] | device selection | status reset to not connected |
//! | [`Error::Connect`] | transport connect | status reset to not connected |
//! | [`Error::ServiceNotFound`] | endpoint resolution | status reset, link closed |
//! | [`Error::CharacteristicNotFound`] | endpoint resolution | status reset, link closed |
//! | [`Error::NotConnected`] | any send | nothing written |
//! | [`Error::Validation`] | any send | nothing written |
//! | [`Error::Write`] | a single write | job halted, send re-enabled |
//! | [`Error::Timeout`] | a write outliving its timeout | job halted, send re-enabled |
//!
//! Nothing is retried.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use nrfgate_types::ValidationError;

/// Errors that can occur while talking to the gateway.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No peripheral was selected.
    #[error("Device selection failed: {0}")]
    Selection(SelectionFailure),

    /// The transport-level connection could not be opened.
    #[error("Connection failed: {reason}")]
    Connect {
        /// Name or identifier of the peripheral, if one was selected.
        device: Option<String>,
        /// The structured reason for the failure.
        reason: ConnectFailure,
    },

    /// The connected peripheral does not expose the target service.
    #[error("Service not found: {uuid} (device exposes {service_count} services)")]
    ServiceNotFound {
        /// The service UUID that was looked up.
        uuid: Uuid,
        /// Number of services the peripheral does expose.
        service_count: usize,
    },

    /// The target service lacks the message characteristic.
    #[error("Characteristic not found: {uuid} in service {service}")]
    CharacteristicNotFound {
        /// The characteristic UUID that was looked up.
        uuid: Uuid,
        /// The service that was searched.
        service: Uuid,
    },

    /// A send was attempted without a live connection handle.
    #[error("Not connected to device")]
    NotConnected,

    /// The message or a setting was rejected before any write.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A write to the characteristic failed.
    #[error("Write failed to characteristic {uuid}: {reason}")]
    Write {
        /// The characteristic UUID.
        uuid: Uuid,
        /// The reason for the failure.
        reason: String,
    },

    /// Bluetooth Low Energy error outside connect and write.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Why device selection produced no peripheral.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SelectionFailure {
    /// No Bluetooth adapter available.
    NoAdapter,
    /// No advertising peripheral carried the target name.
    NoMatch {
        /// The name that was filtered on.
        name: String,
    },
    /// The user dismissed the chooser.
    Cancelled,
}

impl std::fmt::Display for SelectionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAdapter => write!(f, "no Bluetooth adapter available"),
            Self::NoMatch { name } => write!(f, "no device named '{}' found", name),
            Self::Cancelled => write!(f, "selection cancelled by user"),
        }
    }
}

/// Structured reasons for connection failures.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectFailure {
    /// Connection attempt timed out.
    Timeout(Duration),
    /// Service discovery did not finish in time.
    DiscoveryTimeout(Duration),
    /// Generic BLE error.
    BleError(String),
    /// Other/unknown error.
    Other(String),
}

impl std::fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout(d) => write!(f, "connection timed out after {:?}", d),
            Self::DiscoveryTimeout(d) => write!(f, "service discovery timed out after {:?}", d),
            Self::BleError(msg) => write!(f, "BLE error: {}", msg),
            Self::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error {
    /// Create a selection error for a name nobody advertised.
    pub fn no_match(name: impl Into<String>) -> Self {
        Self::Selection(SelectionFailure::NoMatch { name: name.into() })
    }

    /// Create a connection failure with structured reason.
    pub fn connect_failed(device: Option<String>, reason: ConnectFailure) -> Self {
        Self::Connect { device, reason }
    }

    /// Create a write failure.
    pub fn write_failed(uuid: Uuid, reason: impl Into<String>) -> Self {
        Self::Write {
            uuid,
            reason: reason.into(),
        }
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether this error means the session has no usable connection.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Selection(_)
                | Self::Connect { .. }
                | Self::ServiceNotFound { .. }
                | Self::CharacteristicNotFound { .. }
                | Self::NotConnected
        )
    }
}

/// Result type alias using nrfgate-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use nrfgate_types::uuids::{GATEWAY_SERVICE, MESSAGE_CHARACTERISTIC};

    #[test]
    fn test_error_display() {
        let err = Error::no_match("NRF_Gateway_A");
        assert!(err.to_string().contains("NRF_Gateway_A"));

        let err = Error::NotConnected;
        assert_eq!(err.to_string(), "Not connected to device");

        let err = Error::ServiceNotFound {
            uuid: GATEWAY_SERVICE,
            service_count: 3,
        };
        assert!(err.to_string().contains("4fafc201"));
        assert!(err.to_string().contains("3 services"));

        let err = Error::CharacteristicNotFound {
            uuid: MESSAGE_CHARACTERISTIC,
            service: GATEWAY_SERVICE,
        };
        assert!(err.to_string().contains("beb5483e"));

        let err = Error::timeout("write", Duration::from_secs(10));
        assert!(err.to_string().contains("write"));
        assert!(err.to_string().contains("10s"));
    }

    #[test]
    fn test_selection_reasons() {
        let err = Error::Selection(SelectionFailure::Cancelled);
        assert!(err.to_string().contains("cancelled"));

        let err = Error::Selection(SelectionFailure::NoAdapter);
        assert!(err.to_string().contains("no Bluetooth adapter"));
    }

    #[test]
    fn test_connect_failure_display() {
        let err = Error::connect_failed(
            Some("NRF_Gateway_A".into()),
            ConnectFailure::Timeout(Duration::from_secs(15)),
        );
        assert!(err.to_string().contains("timed out after 15s"));

        let err = Error::connect_failed(None, ConnectFailure::BleError("le-connection-abort".into()));
        assert!(err.to_string().contains("le-connection-abort"));
    }

    #[test]
    fn test_validation_is_transparent() {
        let err: Error = ValidationError::EmptyMessage.into();
        assert_eq!(err.to_string(), "message is empty");
        assert!(!err.is_connection_error());
    }

    #[test]
    fn test_connection_error_classification() {
        assert!(Error::NotConnected.is_connection_error());
        assert!(Error::no_match("x").is_connection_error());
        assert!(!Error::write_failed(MESSAGE_CHARACTERISTIC, "gatt error").is_connection_error());
    }

    #[test]
    fn test_btleplug_error_conversion() {
        fn _assert_from_impl<T: From<btleplug::Error>>() {}
        _assert_from_impl::<Error>();
    }
}
