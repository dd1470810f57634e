//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while decoding or encoding OVSDB notation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The JSON does not follow OVSDB notation.
    #[error("invalid OVSDB notation: {message}")]
    InvalidNotation {
        /// Description of the problem.
        message: String,
    },

    /// A value uses a type this client does not model.
    #[error("unsupported value: {message}")]
    UnsupportedValue {
        /// Description of the value.
        message: String,
    },

    /// A required member is missing from an object.
    #[error("missing field: {name}")]
    MissingField {
        /// Name of the missing member.
        name: String,
    },

    /// Unknown operation name.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
}

impl ProtocolError {
    /// Creates an invalid notation error.
    pub fn invalid_notation(message: impl Into<String>) -> Self {
        Self::InvalidNotation {
            message: message.into(),
        }
    }

    /// Creates an unsupported value error.
    pub fn unsupported_value(message: impl Into<String>) -> Self {
        Self::UnsupportedValue {
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(name: impl Into<String>) -> Self {
        Self::MissingField { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProtocolError::missing_field("op");
        assert_eq!(err.to_string(), "missing field: op");

        let err = ProtocolError::invalid_notation("expected array");
        assert!(err.to_string().contains("expected array"));
    }
}
