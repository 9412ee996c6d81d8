//! Search filters and catalog ordering.

use crate::cache::CatalogCache;
use crate::model::{Book, SERIES_SEPARATOR};
use crate::series::reading_order;
use std::cmp::Ordering;
use std::collections::HashSet;
use uuid::Uuid;

/// Whether a series filter selects the node at `path`: the series itself or
/// any of its sub-series.
fn selects(filter: &str, path: &str) -> bool {
    path.strip_prefix(filter)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(SERIES_SEPARATOR))
}

/// Resolves series and book filters into the ids of the books to search.
///
/// Without any filter every cached book is selected. Otherwise the books of
/// every series matching a series filter (including "No Series") are
/// followed by the explicitly named books, without duplicates.
pub fn build_filter(cache: &CatalogCache, series: Option<&[String]>, books: Option<&[Uuid]>) -> Vec<Uuid> {
    if series.is_none() && books.is_none() {
        return cache.books().iter().map(|book| book.id).collect();
    }
    let filters = series.unwrap_or_default();
    let tree = cache.series();
    let mut seen = HashSet::new();
    tree.nodes()
        .into_iter()
        .filter(|node| filters.iter().any(|filter| selects(filter, node.filter_path())))
        .flat_map(|node| node.books.iter().map(|book| book.id))
        .chain(books.unwrap_or_default().iter().copied())
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Order of books across the whole catalog: by series path (books without a
/// series first), then reading order within the series.
pub fn catalog_order(a: &Book, b: &Book) -> Ordering {
    let series = match (&a.series, &b.series) {
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => a.series_segments().cmp(b.series_segments()),
    };
    series.then_with(|| reading_order(a, b))
}
