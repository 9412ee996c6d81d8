//! Markup Error Types
//!
//! Normalization never fails; everything that can go wrong here is about
//! resources referenced from chapter markup.

use derive_more::{Display, Error};

/// A markup error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for markup operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A resource reference resolves outside of the book.
    #[display("invalid resource reference '{reference}' in '{base}'")]
    InvalidResource {
        /// Href of the document containing the reference.
        base: String,
        /// The offending reference, as written in the markup.
        reference: String,
    },
    /// A style identifier does not name a known [`BookStyle`](crate::BookStyle).
    #[display("unknown book style: {_0}")]
    UnknownStyle(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Markup is either well-formed enough or it isn't.
        false
    }
}
