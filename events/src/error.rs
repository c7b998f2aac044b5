//! Error types for the `events` crate.
//!
//! Follows the same pattern as the other crates in the workspace: a root
//! `Error` struct holding an error kind and an optional source.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for change sources.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ChangeSourceErrorKind,
}

/// Categories of change source failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSourceErrorKind {
    /// A subscription could not be established.
    Unavailable,
    /// An established subscription dropped and must be re-acquired.
    Disconnected,
    /// The source has ended and will never produce another payload.
    Closed,
}

impl Error {
    pub fn new(error_kind: ChangeSourceErrorKind) -> Self {
        Error {
            source: None,
            error_kind,
        }
    }

    /// Wraps a lower-level error with the given kind.
    pub fn with_source<E>(error_kind: ChangeSourceErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Error {
            source: Some(source.into()),
            error_kind,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.error_kind == ChangeSourceErrorKind::Closed
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Change source error: {:?} ({source})", self.error_kind),
            None => write!(f, "Change source error: {:?}", self.error_kind),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind_and_source() {
        let err = Error::with_source(ChangeSourceErrorKind::Unavailable, "connection refused");
        let rendered = err.to_string();

        assert!(rendered.contains("Unavailable"));
        assert!(rendered.contains("connection refused"));
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn test_is_closed_only_for_closed_kind() {
        assert!(Error::new(ChangeSourceErrorKind::Closed).is_closed());
        assert!(!Error::new(ChangeSourceErrorKind::Disconnected).is_closed());
        assert!(!Error::new(ChangeSourceErrorKind::Unavailable).is_closed());
    }
}
