//! Search facade resolving catalog filters and mapping hits back to books.

use lectern_catalog::{Book, CatalogCache, build_filter, catalog_order};
use lectern_index::{GroupedResults, QueryEngine, SearchOrder, SearchResult};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// A paragraph search over the catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    /// Series paths to search, sub-series included. `"No Series"` selects
    /// books without one.
    pub series: Option<Vec<String>>,
    pub books: Option<Vec<Uuid>>,
    /// Zero-based page. Without one, every hit up to the result window is
    /// returned.
    pub page: Option<u32>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

/// Unit counted by [`Library::search_books`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Granularity {
    #[default]
    Paragraph,
    Chapter,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryResults {
    pub total_hits: u64,
    pub results: Vec<SearchResult>,
    /// Books with hits that are no longer in the catalog.
    pub missing: Vec<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookHits {
    pub book: Arc<Book>,
    pub occurrences: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookResults {
    pub total_hits: u64,
    /// Matching books in catalog order.
    pub books: Vec<BookHits>,
    /// Books with hits that are no longer in the catalog.
    pub missing: Vec<Uuid>,
}

/// Read side of the library.
///
/// Like [`QueryEngine`], every method returns `None` when the search engine
/// could not answer.
pub struct Library {
    cache: Arc<CatalogCache>,
    queries: QueryEngine,
}

impl Library {
    pub fn new(cache: Arc<CatalogCache>, queries: QueryEngine) -> Self {
        Self { cache, queries }
    }

    pub fn cache(&self) -> &Arc<CatalogCache> {
        &self.cache
    }

    pub fn queries(&self) -> &QueryEngine {
        &self.queries
    }

    #[instrument(skip(self), fields(query = %request.query))]
    pub async fn search(&self, request: &SearchRequest) -> Option<LibraryResults> {
        let filter = build_filter(&self.cache, request.series.as_deref(), request.books.as_deref());
        let found = self
            .queries
            .search(&request.query, &filter, &[], request.page, SearchOrder::Relevance)
            .await?;
        let missing = self.missing(found.results.iter().map(|result| result.book_id));
        Some(LibraryResults {
            total_hits: found.total_hits,
            results: found.results,
            missing,
        })
    }

    /// Every match inside one chapter, in reading order.
    #[instrument(skip(self))]
    pub async fn search_chapter(&self, book: Uuid, chapter: Uuid, query: &str) -> Option<LibraryResults> {
        let found = self.queries.search(query, &[book], &[chapter], None, SearchOrder::Position).await?;
        let missing = self.missing(found.results.iter().map(|result| result.book_id));
        Some(LibraryResults {
            total_hits: found.total_hits,
            results: found.results,
            missing,
        })
    }

    /// Hit counts per book, ordered like the catalog.
    #[instrument(skip(self, series, books))]
    pub async fn search_books(
        &self,
        query: &str,
        series: Option<&[String]>,
        books: Option<&[Uuid]>,
        granularity: Granularity,
    ) -> Option<BookResults> {
        let filter = build_filter(&self.cache, series, books);
        let GroupedResults { total_hits, groups } = match granularity {
            Granularity::Paragraph => self.queries.search_grouped_by_book(query, &filter).await?,
            Granularity::Chapter => self.queries.search_chapters_grouped_by_book(query, &filter).await?,
        };

        let mut results = BookResults {
            total_hits,
            ..BookResults::default()
        };
        for group in groups {
            match self.cache.find(group.id) {
                Some(book) => results.books.push(BookHits {
                    book,
                    occurrences: group.occurrences,
                }),
                None => results.missing.push(group.id),
            }
        }
        results.books.sort_by(|a, b| catalog_order(&a.book, &b.book));
        Some(results)
    }

    fn missing(&self, ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
        let mut seen = HashSet::new();
        ids.filter(|id| !self.cache.contains(*id) && seen.insert(*id)).collect()
    }
}
