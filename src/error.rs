//! Lectern Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Failures of the member crates are attached as child
//! frames under the variant naming the subsystem.

use derive_more::{Display, Error};
use std::path::PathBuf;
use uuid::Uuid;

/// A lectern error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for lectern operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The book does not exist in the catalog.
    #[display("book {_0} not found")]
    BookNotFound(#[error(not(source))] Uuid),
    /// Indexing a book did not complete; the book has been marked unsearchable.
    #[display("indexing of book {_0} failed")]
    IndexingFailed(#[error(not(source))] Uuid),
    /// The search index rejected or failed an operation.
    #[display("search index failure")]
    Index,
    /// The catalog store failed.
    #[display("catalog failure")]
    Catalog,
    /// Book markup could not be processed.
    #[display("markup failure")]
    Markup,
    /// Configuration could not be loaded.
    #[display("invalid configuration")]
    Config,
    /// A local file could not be read or written.
    #[display("could not access {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// Results could not be written out.
    #[display("could not write output")]
    Output,
    /// The background worker pool has shut down.
    #[display("indexing workers are shut down")]
    WorkersClosed,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Index | Self::IndexingFailed(_))
    }
}
