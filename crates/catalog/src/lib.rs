//! The book catalog as the search core sees it.
//!
//! [`CatalogSource`] is the seam to the relational store. [`CatalogCache`]
//! keeps an in-memory view of every book for browsing by series and tag and
//! for turning series and book filters into search filters.

mod cache;
pub mod error;
mod filter;
mod model;
mod series;
mod source;
mod tags;

pub use crate::cache::CatalogCache;
pub use crate::filter::{build_filter, catalog_order};
pub use crate::model::{Book, Chapter, IndexFlags, NO_SERIES, SERIES_SEPARATOR, sortable};
pub use crate::series::{SeriesNode, SeriesTree};
pub use crate::source::{CatalogSnapshot, CatalogSource, MemoryCatalog};
pub use crate::tags::TagEntry;
