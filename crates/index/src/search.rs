//! Read path over the chapter and paragraph collections.
//!
//! Every query answers `None` when the engine fails or rejects it (most
//! commonly an invalid query string). The cause is logged; callers only learn
//! that there is no valid result.

use crate::engine::EngineHandle;
use crate::error::{ErrorKind, Result};
use crate::query::{
    self, DICTIONARY_AGGREGATION, GROUPS_AGGREGATION, base_query, context_query, highlight, term,
    terms_aggregation,
};
use crate::response::{self, Hit};
use crate::schema::{BOOK_FIELD, CHAPTER_FIELD, POSITION_FIELD, SEARCH_FIELD, SIGNATURE_FIELD};
use exn::ResultExt;
use lectern_config::SearchConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::str::FromStr;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchOrder {
    /// Engine relevance score.
    #[default]
    Relevance,
    /// Paragraph position, for searches within a single chapter.
    Position,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParagraph {
    /// Whether this is the matching paragraph rather than context.
    pub main: bool,
    pub position: u32,
    pub text: String,
    pub classes: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub book_id: Uuid,
    pub chapter_id: Uuid,
    pub main_position: u32,
    /// The match and its context, ordered by position.
    pub paragraphs: Vec<SearchParagraph>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub total_hits: u64,
    pub results: Vec<SearchResult>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCount {
    pub id: Uuid,
    pub occurrences: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedResults {
    pub total_hits: u64,
    pub groups: Vec<GroupCount>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryEntry {
    pub word: String,
    pub occurrences: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterSearchResults {
    pub total_hits: u64,
    pub chapters: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
struct ParagraphSource {
    book: Uuid,
    chapter: Uuid,
    position: u32,
    text: String,
    #[serde(default)]
    classes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChapterSource {
    text: String,
}

/// Runs the log-and-discard policy on a query outcome.
fn valid<T>(operation: &'static str, outcome: Result<T>) -> Option<T> {
    match outcome {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(operation, error = ?error, "Query failed, returning no results");
            None
        }
    }
}

fn parse_id(key: &str) -> Result<Uuid> {
    Uuid::from_str(key).or_raise(|| ErrorKind::MalformedResponse(format!("bucket key '{key}' is not an id")))
}

pub struct QueryEngine {
    engine: EngineHandle,
    chapter_index: String,
    paragraph_index: String,
    page_size: u32,
    max_result_window: u32,
    highlight_pre: String,
    highlight_post: String,
}

impl QueryEngine {
    pub fn new(engine: EngineHandle, config: &SearchConfig) -> Self {
        Self {
            engine,
            chapter_index: config.chapter_index.clone(),
            paragraph_index: config.paragraph_index.clone(),
            page_size: config.page_size,
            max_result_window: config.max_result_window,
            highlight_pre: config.highlight_pre.clone(),
            highlight_post: config.highlight_post.clone(),
        }
    }

    /// `size`/`from` for a page, or the whole result window without one.
    fn paginate(&self, body: &mut Value, page: Option<u32>) {
        match page {
            Some(page) => {
                body["size"] = json!(self.page_size);
                body["from"] = json!(page.saturating_mul(self.page_size));
            },
            None => body["size"] = json!(self.max_result_window),
        }
    }

    fn highlight(&self) -> Value {
        highlight(&self.highlight_pre, &self.highlight_post)
    }

    /// Paragraph search with highlighted matches and surrounding context.
    #[instrument(skip(self, books, chapters), fields(books = books.len(), chapters = chapters.len()))]
    pub async fn search(
        &self,
        query: &str,
        books: &[Uuid],
        chapters: &[Uuid],
        page: Option<u32>,
        order: SearchOrder,
    ) -> Option<SearchResults> {
        if books.is_empty() {
            return Some(SearchResults::default());
        }
        valid("search", self.try_search(query, books, chapters, page, order).await)
    }

    async fn try_search(
        &self,
        query: &str,
        books: &[Uuid],
        chapters: &[Uuid],
        page: Option<u32>,
        order: SearchOrder,
    ) -> Result<SearchResults> {
        let mut body = json!({
            "query": base_query(query, books, chapters),
            "highlight": self.highlight(),
        });
        self.paginate(&mut body, page);
        if order == SearchOrder::Position {
            body["sort"] = json!([{ POSITION_FIELD: "asc" }]);
        }
        tracing::debug!(%body, "Paragraph search");
        let response = self.engine.search(&self.paragraph_index, &body).await?;
        let response = response::parse::<ParagraphSource>(response)?;
        let total_hits = response.hits.total.value();
        let results = self.gather_context(response.hits.hits).await?;
        Ok(SearchResults { total_hits, results })
    }

    /// Stitches every hit together with its neighbouring paragraphs, fetched
    /// in a single multi-search.
    async fn gather_context(&self, hits: Vec<Hit<ParagraphSource>>) -> Result<Vec<SearchResult>> {
        if hits.is_empty() {
            return Ok(Vec::new());
        }
        let requests = hits
            .iter()
            .map(|hit| {
                let source = &hit.source;
                (self.paragraph_index.clone(), context_query(source.book, source.chapter, source.position))
            })
            .collect();
        let responses = self.engine.msearch(requests).await?;

        let mut results = Vec::with_capacity(hits.len());
        for (hit, response) in hits.into_iter().zip(responses) {
            let context = response::parse::<ParagraphSource>(response)?;
            let mut paragraphs: Vec<SearchParagraph> = context
                .hits
                .hits
                .into_iter()
                .map(|neighbour| SearchParagraph {
                    main: false,
                    position: neighbour.source.position,
                    text: neighbour.source.text,
                    classes: neighbour.source.classes,
                })
                .collect();
            let text = hit.highlighted(SEARCH_FIELD).map(str::to_string);
            let ParagraphSource {
                book,
                chapter,
                position,
                text: stored,
                classes,
            } = hit.source;
            paragraphs.push(SearchParagraph {
                main: true,
                position,
                text: text.unwrap_or(stored),
                classes,
            });
            paragraphs.sort_by_key(|paragraph| paragraph.position);
            results.push(SearchResult {
                book_id: book,
                chapter_id: chapter,
                main_position: position,
                paragraphs,
            });
        }
        Ok(results)
    }

    /// Paragraph hit counts per book.
    #[instrument(skip(self, books), fields(books = books.len()))]
    pub async fn search_grouped_by_book(&self, query: &str, books: &[Uuid]) -> Option<GroupedResults> {
        if books.is_empty() {
            return Some(GroupedResults::default());
        }
        let outcome = self.grouped(&self.paragraph_index, BOOK_FIELD, query, books).await;
        valid("search grouped by book", outcome)
    }

    /// Paragraph hit counts per chapter of one book.
    #[instrument(skip(self))]
    pub async fn search_grouped_by_chapter(&self, book: Uuid, query: &str) -> Option<Vec<GroupCount>> {
        let outcome = self.grouped(&self.paragraph_index, CHAPTER_FIELD, query, &[book]).await;
        valid("search grouped by chapter", outcome).map(|grouped| grouped.groups)
    }

    /// Chapter hit counts per book.
    #[instrument(skip(self, books), fields(books = books.len()))]
    pub async fn search_chapters_grouped_by_book(&self, query: &str, books: &[Uuid]) -> Option<GroupedResults> {
        if books.is_empty() {
            return Some(GroupedResults::default());
        }
        let outcome = self.grouped(&self.chapter_index, BOOK_FIELD, query, books).await;
        valid("search chapters grouped by book", outcome)
    }

    async fn grouped(&self, index: &str, field: &str, query: &str, books: &[Uuid]) -> Result<GroupedResults> {
        let body = json!({
            "size": 0,
            "query": base_query(query, books, &[]),
            "aggs": terms_aggregation(GROUPS_AGGREGATION, field, self.max_result_window),
        });
        tracing::debug!(%body, "Grouped search");
        let response = response::parse::<Value>(self.engine.search(index, &body).await?)?;
        let groups = response
            .buckets(GROUPS_AGGREGATION)?
            .iter()
            .map(|bucket| {
                Ok(GroupCount {
                    id: parse_id(&bucket.key)?,
                    occurrences: bucket.doc_count,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(GroupedResults {
            total_hits: response.hits.total.value(),
            groups,
        })
    }

    /// Most frequent signature terms of a book, most frequent first.
    #[instrument(skip(self))]
    pub async fn dictionary(&self, book: Uuid) -> Option<Vec<DictionaryEntry>> {
        valid("dictionary", self.try_dictionary(book).await)
    }

    async fn try_dictionary(&self, book: Uuid) -> Result<Vec<DictionaryEntry>> {
        let body = json!({
            "size": 0,
            "query": term(BOOK_FIELD, book.to_string()),
            "aggs": terms_aggregation(
                DICTIONARY_AGGREGATION,
                SIGNATURE_FIELD,
                self.max_result_window.saturating_sub(1),
            ),
        });
        let response = response::parse::<Value>(self.engine.search(&self.paragraph_index, &body).await?)?;
        let mut entries: Vec<DictionaryEntry> = response
            .buckets(DICTIONARY_AGGREGATION)?
            .iter()
            .map(|bucket| DictionaryEntry {
                word: bucket.key.clone(),
                occurrences: bucket.doc_count,
            })
            .collect();
        entries.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));
        Ok(entries)
    }

    /// Chapter-level search, returning matching chapter ids by relevance.
    #[instrument(skip(self, books), fields(books = books.len()))]
    pub async fn search_chapters(&self, query: &str, books: &[Uuid], page: Option<u32>) -> Option<ChapterSearchResults> {
        if books.is_empty() {
            return Some(ChapterSearchResults::default());
        }
        valid("search chapters", self.try_search_chapters(query, books, page).await)
    }

    async fn try_search_chapters(&self, query: &str, books: &[Uuid], page: Option<u32>) -> Result<ChapterSearchResults> {
        let mut body = json!({
            "query": base_query(query, books, &[]),
            "_source": [CHAPTER_FIELD],
        });
        self.paginate(&mut body, page);
        let response = self.engine.search(&self.chapter_index, &body).await?;
        let response = response::parse::<ChapterId>(response)?;
        Ok(ChapterSearchResults {
            total_hits: response.hits.total.value(),
            chapters: response.hits.hits.into_iter().map(|hit| hit.source.chapter).collect(),
        })
    }

    /// Whole chapter text with every match of `query` highlighted. Falls back
    /// to the stored text when nothing matches; `None` when the chapter isn't
    /// indexed.
    #[instrument(skip(self))]
    pub async fn chapter_content(&self, chapter: Uuid, query: &str) -> Option<String> {
        valid("chapter content", self.try_chapter_content(chapter, query).await).flatten()
    }

    async fn try_chapter_content(&self, chapter: Uuid, query: &str) -> Result<Option<String>> {
        let mut highlight = self.highlight();
        highlight["highlight_query"] = query::query_string(query);
        let body = json!({
            "size": 1,
            "query": term(CHAPTER_FIELD, chapter.to_string()),
            "highlight": highlight,
        });
        let response = self.engine.search(&self.chapter_index, &body).await?;
        let response = response::parse::<ChapterSource>(response)?;
        Ok(response.hits.hits.into_iter().next().map(|hit| match hit.highlighted(SEARCH_FIELD) {
            Some(text) => text.to_string(),
            None => hit.source.text,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct ChapterId {
    chapter: Uuid,
}
