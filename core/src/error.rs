//! Error types shared by the core crate.
//!
//! - [`CallError`]: what an endpoint call function fails with
//! - [`ErrorPayload`]: the Error-like value carried by failure events
//! - [`ConfigError`]: problems detected while registering an API map

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Message used when a call fails without any usable error information
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";

/// Failure reported by an endpoint call function.
///
/// Call functions translate their transport's failures into one of these
/// variants; the [classifier](crate::classify) maps them onto an outcome.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    /// The call exceeded its deadline before a response arrived
    #[error("Request timed out: {message}")]
    Timeout {
        /// Transport message
        message: String,
    },

    /// A response arrived with a non-success status
    ///
    /// `status` is `None` (or `Some(0)`) when the transport produced a
    /// response object without a usable status, e.g. an opaque CORS reply.
    #[error("HTTP error (status {status:?}): {message}")]
    Http {
        /// HTTP status code, if any
        status: Option<u16>,
        /// Status text or transport message
        message: String,
        /// Parsed response body, if the call read one
        body: Option<Value>,
    },

    /// No response at all: DNS, refused connection, dropped socket
    #[error("Network error: {message}")]
    Network {
        /// Transport message
        message: String,
    },

    /// Ordinary error raised by the call function itself (bad input, parse failure)
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },

    /// The call failed with something that is not an error value
    #[error("An unknown error occurred")]
    Unknown,
}

impl CallError {
    /// Shorthand for [`CallError::Http`] without a body
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status: Some(status),
            message: message.into(),
            body: None,
        }
    }

    /// Shorthand for [`CallError::Timeout`]
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Shorthand for [`CallError::Network`]
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Shorthand for [`CallError::Other`]
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, treating `0` as absent
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http {
                status: Some(status),
                ..
            } if *status != 0 => Some(*status),
            _ => None,
        }
    }
}

/// Error-like payload stored in failure/mistake/timeout/offline slots.
///
/// Raw [`CallError`]s never reach the state layer; they are flattened into
/// this serializable shape first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error class name (`HTTPError`, `TimeoutError`, ...)
    #[serde(default = "default_error_name")]
    pub name: String,
    /// Human readable message
    #[serde(default = "default_error_message")]
    pub message: String,
    /// HTTP status, when the error carried one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorPayload {
    /// Create a payload with no status
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            status: None,
        }
    }

    /// The synthetic payload used when no error was supplied
    #[must_use]
    pub fn unknown() -> Self {
        Self::new("Error", UNKNOWN_ERROR_MESSAGE)
    }

    /// Read an Error-like host object field by field.
    ///
    /// Missing or mistyped fields fall back individually, so a `message`
    /// or `status` that is present is never discarded.
    #[must_use]
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            name: text("name").unwrap_or_else(default_error_name),
            message: text("message").unwrap_or_else(default_error_message),
            status: object
                .get("status")
                .and_then(Value::as_u64)
                .and_then(|status| u16::try_from(status).ok())
                .filter(|status| *status != 0),
        }
    }
}

fn default_error_name() -> String {
    "Error".to_string()
}

fn default_error_message() -> String {
    UNKNOWN_ERROR_MESSAGE.to_string()
}

impl From<&CallError> for ErrorPayload {
    fn from(error: &CallError) -> Self {
        match error {
            CallError::Timeout { message } => Self::new("TimeoutError", message.clone()),
            CallError::Http { message, .. } => Self {
                name: "HTTPError".to_string(),
                message: message.clone(),
                status: error.status(),
            },
            CallError::Network { message } => Self::new("NetworkError", message.clone()),
            CallError::Other { message } => Self::new("Error", message.clone()),
            CallError::Unknown => Self::unknown(),
        }
    }
}

impl From<CallError> for ErrorPayload {
    fn from(error: CallError) -> Self {
        Self::from(&error)
    }
}

/// Errors detected while assembling an API map
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Endpoint names must be non-empty
    #[error("Endpoint name must not be empty")]
    EmptyName,

    /// The same name was registered twice
    #[error("Endpoint '{0}' is registered more than once")]
    DuplicateEndpoint(String),

    /// Two names normalize to the same identifiers
    #[error("Endpoints '{first}' and '{second}' both derive identifier '{identifier}'")]
    IdentifierCollision {
        /// Name registered first
        first: String,
        /// Name registered second
        second: String,
        /// The shared identifier
        identifier: String,
    },

    /// An override or lookup referenced a name that is not in the map
    #[error("Unknown endpoint '{0}'")]
    UnknownEndpoint(String),
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_object_without_name_keeps_message_and_status() {
        let parsed: ErrorPayload =
            serde_json::from_value(json!({"message": "disk full", "status": 507})).unwrap();
        assert_eq!(parsed.name, "Error");
        assert_eq!(parsed.message, "disk full");
        assert_eq!(parsed.status, Some(507));

        let object = json!({"message": "quota", "status": "507", "code": 9});
        let lenient = ErrorPayload::from_object(object.as_object().unwrap());
        assert_eq!(lenient, ErrorPayload::new("Error", "quota"));
    }

    #[test]
    fn test_zero_status_is_absent() {
        let error = CallError::Http {
            status: Some(0),
            message: "opaque".into(),
            body: None,
        };
        assert_eq!(error.status(), None);
        assert_eq!(CallError::http(503, "Service Unavailable").status(), Some(503));
        assert_eq!(CallError::timeout("slow").status(), None);
    }

    #[test]
    fn test_payload_from_http_error_keeps_status() {
        let payload = ErrorPayload::from(CallError::http(404, "Not Found"));
        assert_eq!(payload.name, "HTTPError");
        assert_eq!(payload.message, "Not Found");
        assert_eq!(payload.status, Some(404));
    }

    #[test]
    fn test_unknown_payload_message() {
        let payload = ErrorPayload::from(CallError::Unknown);
        assert_eq!(payload.message, UNKNOWN_ERROR_MESSAGE);
        assert_eq!(payload, ErrorPayload::unknown());
    }

    #[test]
    fn test_payload_serialization_skips_missing_status() {
        let json = serde_json::to_value(ErrorPayload::new("Error", "boom")).ok();
        assert_eq!(
            json,
            Some(serde_json::json!({ "name": "Error", "message": "boom" }))
        );
    }
}
