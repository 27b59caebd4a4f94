//! Error types for touch-core.
//!
//! Most failures never reach the caller. A watch that fails to connect,
//! handshake or subscribe is simply dropped and picked up again by the
//! scanner, so the errors below mainly surface in logs, in [`Transport`]
//! implementations and in configuration checks.
//!
//! # Error Classification
//!
//! | Error Type | Transient | Handling inside the connector |
//! |------------|-----------|-------------------------------|
//! | [`Error::Timeout`] | yes | Abandon session, wait for rediscovery |
//! | [`Error::Bluetooth`] | yes | Abandon session, wait for rediscovery |
//! | [`Error::NotConnected`] | yes | Cleanup, resume scanning |
//! | [`Error::ConnectionFailed`] | depends on reason | Abandon session |
//! | [`Error::WriteFailed`] | yes | Abandon session |
//! | [`Error::Decode`] | no | Frame dropped, session kept |
//! | [`Error::CharacteristicNotFound`] | no | Abandon session |
//! | [`Error::InvalidConfig`] | no | Rejected before the run starts |
//!
//! [`Transport`]: crate::transport::Transport

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to a Touch SDK watch.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Operation attempted while not connected to the watch.
    #[error("Not connected to device")]
    NotConnected,

    /// Required BLE characteristic not found on the watch.
    #[error("Characteristic not found: {uuid} (searched in {service_count} services)")]
    CharacteristicNotFound {
        /// The UUID that was not found.
        uuid: String,
        /// Number of services that were searched.
        service_count: usize,
    },

    /// A protobuf frame could not be decoded.
    #[error("Invalid frame: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// The watch run has been stopped.
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Connection failed with specific reason.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// The device address that failed to connect.
        device_id: Option<String>,
        /// The structured reason for the failure.
        reason: ConnectionFailureReason,
    },

    /// Write operation failed.
    #[error("Write failed to characteristic {uuid}: {reason}")]
    WriteFailed {
        /// The characteristic UUID.
        uuid: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Structured reasons for connection failures.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectionFailureReason {
    /// Bluetooth adapter not available or powered off.
    AdapterUnavailable,
    /// Device is no longer known to the adapter.
    OutOfRange,
    /// Connection attempt timed out.
    Timeout,
}

impl std::fmt::Display for ConnectionFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AdapterUnavailable => write!(f, "Bluetooth adapter unavailable"),
            Self::OutOfRange => write!(f, "device out of range"),
            Self::Timeout => write!(f, "connection timed out"),
        }
    }
}

impl Error {
    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: impl Into<String>, service_count: usize) -> Self {
        Self::CharacteristicNotFound {
            uuid: uuid.into(),
            service_count,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a connection failure with structured reason.
    pub fn connection_failed(device_id: Option<String>, reason: ConnectionFailureReason) -> Self {
        Self::ConnectionFailed { device_id, reason }
    }

    /// Create a write failure.
    pub fn write_failed(uuid: impl ToString, reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            uuid: uuid.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error comes from the link and the watch may well succeed
    /// on a later attempt.
    ///
    /// The connector never retries by itself; a transient failure only means
    /// the session is abandoned and the watch is left to be rediscovered.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Timeout { .. }
            | Error::Bluetooth(_)
            | Error::NotConnected
            | Error::WriteFailed { .. }
            | Error::Io(_) => true,
            Error::ConnectionFailed { reason, .. } => matches!(
                reason,
                ConnectionFailureReason::OutOfRange | ConnectionFailureReason::Timeout
            ),
            _ => false,
        }
    }
}

/// Result type alias using touch-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotConnected;
        assert_eq!(err.to_string(), "Not connected to device");

        let err = Error::characteristic_not_found("f9d60372", 3);
        assert!(err.to_string().contains("f9d60372"));
        assert!(err.to_string().contains("3 services"));

        let err = Error::timeout("connect", Duration::from_secs(10));
        assert!(err.to_string().contains("connect"));
        assert!(err.to_string().contains("10s"));

        let err = Error::invalid_config("monitor interval must be positive");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: monitor interval must be positive"
        );
    }

    #[test]
    fn test_connection_failed_display() {
        let err = Error::connection_failed(
            Some("AA:BB".into()),
            ConnectionFailureReason::AdapterUnavailable,
        );
        assert!(err.to_string().contains("adapter unavailable"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::NotConnected.is_transient());
        assert!(Error::timeout("subscribe", Duration::from_secs(1)).is_transient());
        assert!(Error::write_failed("f9d60372", "gatt error").is_transient());
        assert!(
            Error::connection_failed(None, ConnectionFailureReason::Timeout).is_transient()
        );

        assert!(!Error::Cancelled.is_transient());
        assert!(!Error::invalid_config("bad").is_transient());
        assert!(
            !Error::connection_failed(None, ConnectionFailureReason::AdapterUnavailable)
                .is_transient()
        );
    }

    #[test]
    fn test_decode_error_conversion() {
        use prost::Message;
        let decode_err = crate::proto::Update::decode(&[0xFFu8][..]).unwrap_err();
        let err: Error = decode_err.into();
        assert!(matches!(err, Error::Decode(_)));
        assert!(err.to_string().starts_with("Invalid frame"));
    }

    #[test]
    fn test_btleplug_error_conversion() {
        fn _assert_from_impl<T: From<btleplug::Error>>() {}
        _assert_from_impl::<Error>();
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_transient());
    }
}
