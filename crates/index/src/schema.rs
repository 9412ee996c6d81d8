//! Collection settings and field mappings.
//!
//! Both collections store the normalized markup in `text`:
//! - `text` is tokenized without case folding (the plain variant),
//! - `text.stripped` is the case-insensitive variant queries run against,
//! - `text.signature` (paragraphs only) is the heavily stemmed, stopword
//!   filtered variant the vocabulary dictionary is aggregated from.

use serde_json::{Value, json};

pub(crate) const BOOK_FIELD: &str = "book";
pub(crate) const CHAPTER_FIELD: &str = "chapter";
pub(crate) const POSITION_FIELD: &str = "position";
pub(crate) const SEARCH_FIELD: &str = "text.stripped";
pub(crate) const SIGNATURE_FIELD: &str = "text.signature";

/// Index settings shared by both collections: result window and analyzers.
pub fn settings(max_result_window: u32, locale: &str) -> Value {
    json!({
        "index": {
            "max_inner_result_window": max_result_window,
            "analysis": {
                "analyzer": {
                    "strip_html_analyzer": {
                        "tokenizer": "classic",
                        "filter": ["lowercase"],
                        "char_filter": ["html_stripper"]
                    },
                    "strip_html_cs_analyzer": {
                        "tokenizer": "classic",
                        "char_filter": ["html_stripper"]
                    },
                    "signature_analyzer": {
                        "tokenizer": "standard",
                        "filter": [
                            "lowercase",
                            "possessive_stemmer",
                            "suffix_cleanup",
                            "dictionary_stemmer",
                            "english_stops",
                            "dictionary_stops",
                            "revert_hyphens",
                            "remove_duplicates"
                        ],
                        "char_filter": ["html_stripper", "normalize_apostrophes", "convert_hyphens"]
                    }
                },
                "char_filter": {
                    "html_stripper": {
                        "type": "html_strip"
                    },
                    "convert_hyphens": {
                        "type": "pattern_replace",
                        "pattern": "([^\\s]{3,})-([^\\s]{3,})",
                        "replacement": "$1_$2"
                    },
                    "normalize_apostrophes": {
                        "type": "mapping",
                        "mappings": ["\u{2019} => '"]
                    }
                },
                "filter": {
                    "suffix_cleanup": {
                        "type": "length",
                        "min": 3
                    },
                    "possessive_stemmer": {
                        "type": "stemmer",
                        "name": "possessive_english"
                    },
                    "dictionary_stemmer": {
                        "type": "hunspell",
                        "locale": locale,
                        "dedup": true
                    },
                    "english_stops": {
                        "type": "stop",
                        "stopwords": "_english_"
                    },
                    "dictionary_stops": {
                        "type": "stop",
                        "stopwords_path": format!("hunspell/{locale}/stopwords.txt"),
                        "ignore_case": true
                    },
                    "revert_hyphens": {
                        "type": "pattern_replace",
                        "pattern": "_",
                        "replacement": "-"
                    }
                }
            }
        }
    })
}

/// Mapping for the chapter collection.
pub fn chapter_mapping() -> Value {
    json!({
        "properties": {
            "book": { "type": "keyword" },
            "chapter": { "type": "keyword" },
            "position": { "type": "integer" },
            "text": {
                "type": "text",
                "analyzer": "strip_html_cs_analyzer",
                "fields": {
                    "stripped": {
                        "type": "text",
                        "analyzer": "strip_html_analyzer"
                    }
                }
            }
        }
    })
}

/// Mapping for the paragraph collection.
pub fn paragraph_mapping() -> Value {
    json!({
        "properties": {
            "book": { "type": "keyword" },
            "chapter": { "type": "keyword" },
            "position": { "type": "integer" },
            "classes": { "type": "keyword" },
            "text": {
                "type": "text",
                "analyzer": "strip_html_cs_analyzer",
                "fields": {
                    "stripped": {
                        "type": "text",
                        "analyzer": "strip_html_analyzer"
                    },
                    "signature": {
                        "type": "text",
                        "analyzer": "signature_analyzer",
                        "fielddata": true
                    }
                }
            }
        }
    })
}
