//! Catalog Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use uuid::Uuid;

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The book does not exist in the catalog.
    #[display("book {_0} not found")]
    BookNotFound(#[error(not(source))] Uuid),
    /// The chapter does not exist in the catalog.
    #[display("chapter {_0} not found")]
    ChapterNotFound(#[error(not(source))] Uuid),
    /// The backing store could not be read or written.
    #[display("catalog store unavailable: {_0}")]
    Unavailable(#[error(not(source))] String),
    /// A serialized catalog snapshot could not be read or written.
    #[display("invalid catalog snapshot")]
    InvalidSnapshot,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
