//! Search Index Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A search index error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for search index operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The engine could not be reached at all.
    #[display("search engine unavailable: {_0}")]
    Unavailable(#[error(not(source))] String),
    /// The engine answered with a non-success status.
    #[display("search engine rejected {operation} ({status}): {reason}")]
    Rejected {
        /// Engine operation, e.g. `bulk` or `search`.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body or engine-provided reason.
        reason: String,
    },
    /// Some items of a bulk or delete-by-query request failed.
    #[display("{operation} partially failed: {reason}")]
    PartialFailure {
        /// Engine operation that reported the failures.
        operation: &'static str,
        /// First reported failure.
        reason: String,
    },
    /// The engine answered with something that doesn't match the expected shape.
    #[display("malformed search engine response: {_0}")]
    MalformedResponse(#[error(not(source))] String),
    /// Provisioning a collection failed.
    #[display("failed to provision collection '{_0}'")]
    Provision(#[error(not(source))] String),
    /// Re-indexing a book failed.
    #[display("failed to index book {_0}")]
    Index(#[error(not(source))] String),
    /// Removing documents failed.
    #[display("failed to delete documents of book {_0}")]
    Delete(#[error(not(source))] String),
    /// Removing collections failed.
    #[display("failed to reset collections")]
    Reset,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
