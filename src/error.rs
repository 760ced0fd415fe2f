//! Error types for manga-dl
//!
//! A single flat error enum covers the whole crate. Retryability is a
//! property of the error itself: only transport-level failures are
//! transient, everything else propagates on first occurrence.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for manga-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for manga-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure (connection error, timeout, HTTP protocol
    /// failure). The only retryable class.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A cancellation checkpoint observed a pending cancellation.
    ///
    /// Never retried, never swallowed; always resolves at the owning
    /// task's finalization step.
    #[error("operation cancelled")]
    Cancelled,

    /// I/O error while persisting a page or touching the output directory
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure while building or saving a chapter archive
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// A page asset download failed for a non-cancellation reason
    #[error("page {index} failed: {reason}")]
    Page {
        /// Zero-based index of the page within its chapter
        index: usize,
        /// Underlying failure, stringified
        reason: String,
    },

    /// The asset URL produced by a crawler could not be parsed
    #[error("invalid asset URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// No crawler is registered for the named source
    #[error("unknown source: {0}")]
    UnknownSource(String),

    /// An operation was requested in a state that does not allow it
    #[error("cannot {operation} in state {state}")]
    InvalidState {
        /// The operation that was attempted (e.g. "download")
        operation: String,
        /// The current state that prevents the operation
        state: String,
    },

    /// The configured output directory could not be prepared
    #[error("output directory {path} unusable: {reason}")]
    OutputDir {
        /// The directory that could not be created or written
        path: PathBuf,
        /// The reason preparation failed
        reason: String,
    },
}

impl Error {
    /// Returns true if the error is transient and the operation should be
    /// retried.
    ///
    /// Transport failures (connection refused, timeouts, HTTP 5xx) are
    /// transient. Cancellation, I/O, archive and state errors are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Returns true if the error is a cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_is_not_transient() {
        assert!(!Error::Cancelled.is_transient());
        assert!(Error::Cancelled.is_cancelled());
    }

    #[test]
    fn io_error_is_not_transient() {
        let err = Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));
        assert!(
            !err.is_transient(),
            "filesystem errors must not be retried, whatever their kind"
        );
    }

    #[test]
    fn page_failure_is_not_transient() {
        let err = Error::Page {
            index: 3,
            reason: "truncated body".to_string(),
        };
        assert!(!err.is_transient());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn invalid_state_formats_operation_and_state() {
        let err = Error::InvalidState {
            operation: "download".to_string(),
            state: "Downloading".to_string(),
        };
        assert_eq!(err.to_string(), "cannot download in state Downloading");
    }

    #[test]
    fn unknown_source_names_the_source() {
        let err = Error::UnknownSource("mangavault".to_string());
        assert!(err.to_string().contains("mangavault"));
    }
}
