//! Request body builders.

use crate::schema::{BOOK_FIELD, CHAPTER_FIELD, POSITION_FIELD, SEARCH_FIELD};
use serde_json::{Value, json};
use uuid::Uuid;

/// Paragraphs on either side of a hit included as context.
pub(crate) const CONTEXT_RADIUS: u32 = 2;
pub(crate) const GROUPS_AGGREGATION: &str = "groups";
pub(crate) const DICTIONARY_AGGREGATION: &str = "dictionary";

pub(crate) fn term(field: &str, value: impl Into<Value>) -> Value {
    json!({ "term": { field: value.into() } })
}

pub(crate) fn query_string(query: &str) -> Value {
    json!({
        "query_string": {
            "query": query,
            "default_field": SEARCH_FIELD,
            "default_operator": "AND"
        }
    })
}

/// Full-text query restricted to `books` and, when non-empty, `chapters`.
pub(crate) fn base_query(query: &str, books: &[Uuid], chapters: &[Uuid]) -> Value {
    let should: Vec<Value> = books.iter().map(|id| term(BOOK_FIELD, id.to_string())).collect();
    let must: Vec<Value> = chapters.iter().map(|id| term(CHAPTER_FIELD, id.to_string())).collect();
    json!({
        "bool": {
            "must": [query_string(query)],
            "filter": {
                "bool": {
                    "should": should,
                    "minimum_should_match": 1,
                    "must": must
                }
            }
        }
    })
}

/// Whole-field highlighting of the case-insensitive text.
pub(crate) fn highlight(pre_tag: &str, post_tag: &str) -> Value {
    json!({
        "pre_tags": [pre_tag],
        "post_tags": [post_tag],
        "fields": {
            SEARCH_FIELD: { "number_of_fragments": 0 }
        }
    })
}

/// Paragraphs surrounding `position` in the same chapter, excluding itself.
pub(crate) fn context_query(book: Uuid, chapter: Uuid, position: u32) -> Value {
    json!({
        "size": CONTEXT_RADIUS * 2,
        "query": {
            "bool": {
                "must": [
                    term(BOOK_FIELD, book.to_string()),
                    term(CHAPTER_FIELD, chapter.to_string()),
                    {
                        "range": {
                            POSITION_FIELD: {
                                "gte": position.saturating_sub(CONTEXT_RADIUS),
                                "lte": position + CONTEXT_RADIUS
                            }
                        }
                    }
                ],
                "must_not": [term(POSITION_FIELD, position)]
            }
        }
    })
}

pub(crate) fn terms_aggregation(name: &str, field: &str, size: u32) -> Value {
    json!({
        name: {
            "terms": { "field": field, "size": size }
        }
    })
}
