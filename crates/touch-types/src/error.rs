//! Error types for data parsing in touch-types.

use thiserror::Error;

/// Errors that can occur when interpreting data received from a watch.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in touch-core).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A custom characteristic format string could not be parsed.
    #[error("Invalid format '{format}': {reason}")]
    InvalidFormat { format: String, reason: String },

    /// A payload did not have the length its format describes.
    #[error("Payload length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// A gesture type value outside the known set.
    #[error("Unknown gesture type: {0}")]
    UnknownGesture(i32),
}

/// Result type alias using touch-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_mismatch_display() {
        let err = ParseError::LengthMismatch {
            expected: 12,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "Payload length mismatch: expected 12 bytes, got 4"
        );
    }

    #[test]
    fn test_invalid_format_display() {
        let err = ParseError::InvalidFormat {
            format: ">3z".into(),
            reason: "unknown format code 'z'".into(),
        };
        assert!(err.to_string().starts_with("Invalid format '>3z'"));
    }
}
