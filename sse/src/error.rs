//! Error types for the `sse` crate.
//!
//! Follows the same pattern as `events::error` with a root Error struct and
//! error kind enums.

use std::error::Error as StdError;
use std::fmt;

pub type Result<T> = core::result::Result<T, Error>;

/// Top-level error type for the fan-out subsystem.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in the fan-out subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The hub control loop is no longer running.
    HubStopped,
    /// A payload cannot be framed as a stream event.
    MalformedPayload(PayloadErrorKind),
}

/// Reasons a payload is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadErrorKind {
    Empty,
    InvalidUtf8,
    CarriageReturn,
    Serialization,
}

impl Error {
    pub fn hub_stopped() -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::HubStopped,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::HubStopped => write!(f, "SSE hub is not running"),
            ErrorKind::MalformedPayload(kind) => write!(f, "Malformed payload: {:?}", kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::MalformedPayload(PayloadErrorKind::InvalidUtf8),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::MalformedPayload(PayloadErrorKind::Serialization),
        }
    }
}

/// Helper function to create malformed payload errors.
pub fn payload_error(kind: PayloadErrorKind) -> Error {
    Error {
        source: None,
        error_kind: ErrorKind::MalformedPayload(kind),
    }
}
