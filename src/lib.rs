//! Lectern: full-text search over a library of digitized books.
//!
//! The member crates do the heavy lifting: `lectern-markup` normalizes and
//! splits chapter markup, `lectern-index` owns the search collections and
//! `lectern-catalog` keeps the in-memory view of the catalog. This crate ties
//! them together: [`Indexer`] runs indexing jobs and keeps every book's
//! searchable flag honest, [`apply_toc`] turns a table-of-contents selection
//! into chapters and [`Library`] answers searches in catalog terms.

pub mod error;
mod indexer;
mod library;
#[cfg(test)]
mod testing;
mod toc;

pub use crate::indexer::{IndexEvent, Indexer};
pub use crate::library::{BookHits, BookResults, Granularity, Library, LibraryResults, SearchRequest};
pub use crate::toc::{AppliedToc, apply_toc};
