//! Error types for the SJMP protocol engine.
//!
//! Every failure in the registry, the dispatcher and the client surfaces as an
//! [`SjmpError`]. The [`ErrorKind`] classification decides how the error is
//! reported (enveloped to the caller, returned to the host, or logged).

use crate::types::WireType;
use thiserror::Error;

/// Main error type for SJMP.
#[derive(Debug, Error)]
pub enum SjmpError {
    // Registration errors
    #[error("Object already registered: name '{name}'")]
    DuplicateObject { name: String },

    #[error("Object '{name}' not found")]
    ObjectNotFound { name: String },

    #[error("Duplicate {kind} name '{name}' in object declaration")]
    DuplicateMember { kind: &'static str, name: String },

    #[error("Min should be LT or equal to max: {min} <= {max}")]
    InvalidLimits { min: String, max: String },

    #[error("Having {category} limits for type '{wire_type}' is not allowed: {property}")]
    LimitsNotAllowed {
        property: String,
        wire_type: WireType,
        category: &'static str,
    },

    #[error("Having 'show_graph' for type '{wire_type}' is not allowed: {property}")]
    GraphNotAllowed { property: String, wire_type: WireType },

    #[error("Parameter '{parameter}' of action '{action}' can not be of type 'void'")]
    VoidParameter { action: String, parameter: String },

    // Request errors
    #[error("Unknown object '{0}'")]
    UnknownObject(String),

    #[error("Unknown property '{0}'")]
    UnknownProperty(String),

    #[error("Unknown action '{0}'")]
    UnknownAction(String),

    #[error("Argument '{0}' does not exist")]
    UnknownParameter(String),

    #[error("Argument '{0}' must be a scalar type")]
    NonScalarParameter(String),

    #[error("Attempt to set value for readonly property '{0}'")]
    ReadOnlyProperty(String),

    #[error("Trying to set a value that is less than minimal: {value} < {min}")]
    BelowMinimum { value: String, min: String },

    #[error("Trying to set a value that is greater than maximal: {value} > {max}")]
    AboveMaximum { value: String, max: String },

    #[error("Expected a value of type '{expected}', got {found}")]
    TypeMismatch { expected: WireType, found: String },

    #[error("Value {value} is out of range for type '{wire_type}'")]
    ValueOutOfRange { value: String, wire_type: WireType },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Unsupported action '{0}'")]
    UnsupportedVerb(String),

    #[error("Length of the request is too large (limit {limit} bytes)")]
    PayloadTooLarge { limit: usize },

    #[error("Wrong request method {0}")]
    MethodNotAllowed(String),

    #[error("Unauthorized")]
    Unauthorized,

    // Internal errors
    #[error("Action '{action}' failed: {message}")]
    ActionFailed { action: String, message: String },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Registry lock poisoned")]
    LockPoisoned,

    #[error("Internal error: {message}")]
    Internal { message: String },

    // Startup / configuration errors
    #[error("Can not find free TCP port in range {start} - {end} to bind to")]
    PortRangeExhausted { start: u16, end: u16 },

    #[error("Server start error on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // Client errors
    #[error("Result is not ok: {message}")]
    Protocol { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },
}

/// Result type alias for SJMP operations.
pub type Result<T> = std::result::Result<T, SjmpError>;

/// Coarse classification used for logging and HTTP mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent something invalid. Reported, logged at low severity.
    Usage,
    /// The host declared or configured something invalid.
    Configuration,
    /// Something failed inside the engine or a host action.
    Internal,
    /// Raised by the client stub.
    Client,
}

impl From<serde_json::Error> for SjmpError {
    fn from(err: serde_json::Error) -> Self {
        SjmpError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for SjmpError {
    fn from(err: reqwest::Error) -> Self {
        SjmpError::Transport {
            message: err.to_string(),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for SjmpError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        SjmpError::LockPoisoned
    }
}

impl SjmpError {
    /// Shorthand for a malformed request.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        SjmpError::InvalidRequest {
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SjmpError::UnknownObject(_)
            | SjmpError::UnknownProperty(_)
            | SjmpError::UnknownAction(_)
            | SjmpError::UnknownParameter(_)
            | SjmpError::NonScalarParameter(_)
            | SjmpError::ReadOnlyProperty(_)
            | SjmpError::BelowMinimum { .. }
            | SjmpError::AboveMaximum { .. }
            | SjmpError::TypeMismatch { .. }
            | SjmpError::ValueOutOfRange { .. }
            | SjmpError::InvalidRequest { .. }
            | SjmpError::UnsupportedVerb(_)
            | SjmpError::PayloadTooLarge { .. }
            | SjmpError::MethodNotAllowed(_)
            | SjmpError::Unauthorized => ErrorKind::Usage,

            SjmpError::DuplicateObject { .. }
            | SjmpError::ObjectNotFound { .. }
            | SjmpError::DuplicateMember { .. }
            | SjmpError::InvalidLimits { .. }
            | SjmpError::LimitsNotAllowed { .. }
            | SjmpError::GraphNotAllowed { .. }
            | SjmpError::VoidParameter { .. }
            | SjmpError::PortRangeExhausted { .. }
            | SjmpError::Bind { .. }
            | SjmpError::Config { .. } => ErrorKind::Configuration,

            SjmpError::Protocol { .. } | SjmpError::Transport { .. } => ErrorKind::Client,

            SjmpError::ActionFailed { .. }
            | SjmpError::Json { .. }
            | SjmpError::LockPoisoned
            | SjmpError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Check if this error was caused by the caller rather than the server.
    pub fn is_usage(&self) -> bool {
        self.kind() == ErrorKind::Usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SjmpError::UnknownObject("Sample".into());
        assert_eq!(err.to_string(), "Unknown object 'Sample'");

        let err = SjmpError::PortRangeExhausted {
            start: 40234,
            end: 40240,
        };
        assert_eq!(
            err.to_string(),
            "Can not find free TCP port in range 40234 - 40240 to bind to"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(SjmpError::UnknownProperty("x".into()).kind(), ErrorKind::Usage);
        assert_eq!(
            SjmpError::DuplicateObject { name: "a".into() }.kind(),
            ErrorKind::Configuration
        );
        assert_eq!(SjmpError::LockPoisoned.kind(), ErrorKind::Internal);
        assert!(SjmpError::UnknownProperty("x".into()).is_usage());
        assert!(!SjmpError::LockPoisoned.is_usage());
        assert_eq!(
            SjmpError::Protocol {
                message: "nope".into()
            }
            .kind(),
            ErrorKind::Client
        );
    }

    #[test]
    fn test_json_error_conversion() {
        let err: SjmpError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, SjmpError::Json { .. }));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
