//! Core error types for `tidewire`.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::custom::CustomRepositoryError;

/// Status code the server uses to reject a missing or stale session.
pub const UNAUTHORIZED_STATUS: u16 = 401;

// ============================================================================
// Repository Error
// ============================================================================

/// Error surfaced by every repository call.
///
/// Exactly one variant describes a failure. [`RepositoryError::Custom`] is
/// never produced by the repository itself, only by
/// [`RepositoryError::map_custom_error`].
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The request path could not be joined onto the base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The server or transport rejected the request.
    #[error("Request failed: {0}")]
    Request(#[source] ResponseError),

    /// The device has no usable network connection.
    #[error("No network connection")]
    NoNetworkConnection,

    /// There is no session, or the server says it has expired.
    #[error("Unauthenticated session")]
    UnauthenticatedSession,

    /// The response body is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[source] serde_json::Error),

    /// The response body is valid JSON of an unexpected shape.
    #[error("Decode error: {0}")]
    Decode(#[source] DecodeError),

    /// A domain-specific error mapped from a request error.
    #[error("{name}")]
    Custom {
        /// Display name of the custom error.
        name: String,
        /// The custom error value.
        error: Arc<dyn CustomRepositoryError>,
    },

    /// A polling request hit its configured retry bound.
    #[error("Polling gave up after {attempts} attempts")]
    PollingExhausted {
        /// Requests issued before giving up.
        attempts: u32,
    },

    /// The scheduler dropped a polling wake-up without running it.
    #[error("Polling interrupted after {attempts} attempts")]
    PollingInterrupted {
        /// Requests issued before the wake-up was lost.
        attempts: u32,
    },
}

impl RepositoryError {
    /// Returns true if the caller may reasonably try the same call again.
    pub fn is_retryable(&self) -> bool {
        match self {
            RepositoryError::NoNetworkConnection
            | RepositoryError::PollingExhausted { .. }
            | RepositoryError::PollingInterrupted { .. } => true,
            RepositoryError::Request(error) => {
                error.kind == FailureKind::Timeout || error.status.is_some_and(|s| s >= 500)
            }
            _ => false,
        }
    }

    /// Returns the underlying response error, if this is a request error.
    pub fn response_error(&self) -> Option<&ResponseError> {
        match self {
            RepositoryError::Request(error) => Some(error),
            _ => None,
        }
    }

    /// Returns the custom error name, if this is a custom error.
    pub fn custom_name(&self) -> Option<&str> {
        match self {
            RepositoryError::Custom { name, .. } => Some(name),
            _ => None,
        }
    }
}

// ============================================================================
// Response Error
// ============================================================================

/// How an HTTP exchange failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The host could not be reached at all.
    Connectivity,
    /// The request did not finish within the configured timeout.
    Timeout,
    /// The server answered with a non-2xx status.
    Status,
    /// Anything else the transport reported (building, body read, TLS).
    Transport,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Connectivity => write!(f, "connectivity"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Status => write!(f, "status"),
            FailureKind::Transport => write!(f, "transport"),
        }
    }
}

/// Failure reported by the HTTP executor.
///
/// Whatever body the server sent is kept, both as text and, when it is a
/// JSON object, parsed, so callers can inspect error payloads.
#[derive(Debug, Clone, Error)]
#[error("{kind} failure: {message}")]
pub struct ResponseError {
    /// Failure category.
    pub kind: FailureKind,
    /// HTTP status code, when the server answered.
    pub status: Option<u16>,
    /// Diagnostic message (reason phrase or transport error).
    pub message: String,
    /// Body text, if any was received.
    pub body_text: Option<String>,
    /// Body parsed as a JSON object, if it was one.
    pub body: Option<Map<String, Value>>,
}

impl ResponseError {
    /// Creates a connectivity failure (no route to the host).
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::bare(FailureKind::Connectivity, message)
    }

    /// Creates a timeout failure.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::bare(FailureKind::Timeout, message)
    }

    /// Creates a generic transport failure.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::bare(FailureKind::Transport, message)
    }

    /// Creates a failure from a non-2xx response.
    pub fn status(status: u16, message: impl Into<String>, body: &[u8]) -> Self {
        let body_text = (!body.is_empty()).then(|| String::from_utf8_lossy(body).into_owned());
        let parsed = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        };

        Self {
            kind: FailureKind::Status,
            status: Some(status),
            message: message.into(),
            body_text,
            body: parsed,
        }
    }

    fn bare(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            body_text: None,
            body: None,
        }
    }

    /// Returns true if the failure means there is no network.
    pub fn is_no_network(&self) -> bool {
        self.kind == FailureKind::Connectivity
    }

    /// Returns true if the server rejected the session.
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(UNAUTHORIZED_STATUS)
    }

    /// Message and body text joined, for substring matching.
    pub fn diagnostic(&self) -> String {
        match &self.body_text {
            Some(body) => format!("{} {}", self.message, body),
            None => self.message.clone(),
        }
    }
}

// ============================================================================
// Decode Error
// ============================================================================

/// A decoder rejected a well-formed JSON value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A required key is absent.
    #[error("Missing key: {0}")]
    MissingKey(String),

    /// A value had the wrong JSON type.
    #[error("Type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        /// What the decoder wanted.
        expected: String,
        /// What the payload contained.
        actual: String,
    },

    /// Any other rejection.
    #[error("{0}")]
    Custom(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        let message = err.to_string();

        if let Some(rest) = message.strip_prefix("missing field `") {
            if let Some((field, _)) = rest.split_once('`') {
                return DecodeError::MissingKey(field.to_string());
            }
        }

        if let Some(rest) = message.strip_prefix("invalid type: ") {
            if let Some((actual, expected)) = rest.split_once(", expected ") {
                let expected = expected.split(" at line ").next().unwrap_or(expected);
                return DecodeError::TypeMismatch {
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                };
            }
        }

        DecodeError::Custom(message)
    }
}

// ============================================================================
// Session Error
// ============================================================================

/// Session state machine violations and persistence failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// `login` was called while a session is active.
    #[error("A session is already active")]
    AlreadyAuthenticated,

    /// `update`, `logout`, or `expire` was called without a session.
    #[error("No active session")]
    NotAuthenticated,

    /// The user handed to `login` or `update` carries no token.
    #[error("Authenticated user has no session token")]
    MissingToken,

    /// Secure storage refused the write.
    #[error("Session storage error: {0}")]
    Storage(String),
}

// ============================================================================
// Config Error
// ============================================================================

/// Errors building or loading a [`crate::NetworkingConfiguration`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No domain was configured.
    #[error("Configuration has no domain")]
    MissingDomain,

    /// Scheme, host, port, and path do not form a valid URL.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// Pinning is enabled but no certificate was given.
    #[error("Certificate pinning enabled without a certificate path")]
    MissingCertificate,

    /// IO error reading the configuration file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Deserialize)]
    #[allow(dead_code)]
    struct Entity {
        id: u32,
        name: String,
    }

    #[test]
    fn test_decode_error_missing_key() {
        let err = serde_json::from_value::<Entity>(serde_json::json!({"id": 1})).unwrap_err();
        assert_eq!(DecodeError::from(err), DecodeError::MissingKey("name".to_string()));
    }

    #[test]
    fn test_decode_error_type_mismatch() {
        let err = serde_json::from_value::<Entity>(serde_json::json!({"id": "one", "name": "x"}))
            .unwrap_err();
        match DecodeError::from(err) {
            DecodeError::TypeMismatch { expected, actual } => {
                assert_eq!(expected, "u32");
                assert_eq!(actual, "string \"one\"");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_status_error_keeps_json_body() {
        let err = ResponseError::status(422, "Unprocessable Entity", br#"{"code": "E42"}"#);
        assert_eq!(err.status, Some(422));
        assert_eq!(err.body.unwrap()["code"], "E42");
        assert_eq!(err.body_text.as_deref(), Some(r#"{"code": "E42"}"#));
    }

    #[test]
    fn test_status_error_plain_body() {
        let err = ResponseError::status(500, "Internal Server Error", b"boom");
        assert!(err.body.is_none());
        assert_eq!(err.diagnostic(), "Internal Server Error boom");
    }

    #[test]
    fn test_classification_helpers() {
        assert!(ResponseError::connectivity("offline").is_no_network());
        assert!(ResponseError::status(401, "Unauthorized", b"").is_unauthorized());
        assert!(!ResponseError::status(403, "Forbidden", b"").is_unauthorized());
    }

    #[test]
    fn test_retryable() {
        assert!(RepositoryError::NoNetworkConnection.is_retryable());
        assert!(RepositoryError::Request(ResponseError::status(503, "", b"")).is_retryable());
        assert!(RepositoryError::Request(ResponseError::timeout("slow")).is_retryable());
        assert!(!RepositoryError::Request(ResponseError::status(404, "", b"")).is_retryable());
        assert!(!RepositoryError::UnauthenticatedSession.is_retryable());
    }
}
