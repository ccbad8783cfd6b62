//! Error types for the `sse` crate.
//!
//! Follows the same pattern as the other layers: a root `Error` struct holding
//! an error kind and an optional source for error chaining.

use std::error::Error as StdError;
use std::fmt;

/// The error type handler callbacks and submitted tasks return.
pub type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Debug)]
pub struct Error {
    pub source: Option<BoxError>,
    pub error_kind: ErrorKind,
}

/// Kinds of errors that can occur on a single connection.
///
/// None of these ever escape the connection they happened on; they are handed
/// to an [`ErrorSink`](crate::executor::ErrorSink) instead.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// A handler callback or submitted task returned an error.
    Handler,
    /// A handler callback or submitted task panicked.
    Panicked(String),
}

impl Error {
    pub fn new(error_kind: ErrorKind) -> Self {
        Self {
            source: None,
            error_kind,
        }
    }

    pub fn with_source(error_kind: ErrorKind, source: BoxError) -> Self {
        Self {
            source: Some(source),
            error_kind,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Handler => match &self.source {
                Some(source) => write!(f, "Handler error: {source}"),
                None => write!(f, "Handler error"),
            },
            ErrorKind::Panicked(msg) => write!(f, "Handler panicked: {msg}"),
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

impl From<BoxError> for Error {
    fn from(err: BoxError) -> Self {
        Error::with_source(ErrorKind::Handler, err)
    }
}
