//! Typed views over engine search responses.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse<T> {
    pub hits: Hits<T>,
    #[serde(default)]
    pub aggregations: HashMap<String, Aggregation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Hits<T> {
    pub total: Total,
    pub hits: Vec<Hit<T>>,
}

/// Older engines report a bare count, newer ones an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Total {
    Count(u64),
    Relation { value: u64 },
}

impl Total {
    pub fn value(&self) -> u64 {
        match self {
            Self::Count(value) | Self::Relation { value } => *value,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Hit<T> {
    #[serde(rename = "_source")]
    pub source: T,
    #[serde(default)]
    pub highlight: HashMap<String, Vec<String>>,
}

impl<T> Hit<T> {
    pub fn highlighted(&self, field: &str) -> Option<&str> {
        self.highlight.get(field).and_then(|fragments| fragments.first()).map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Aggregation {
    pub buckets: Vec<Bucket>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Bucket {
    pub key: String,
    pub doc_count: u64,
}

impl<T> SearchResponse<T> {
    pub fn buckets(&self, name: &str) -> Result<&[Bucket]> {
        match self.aggregations.get(name) {
            Some(aggregation) => Ok(&aggregation.buckets),
            None => exn::bail!(ErrorKind::MalformedResponse(format!("missing aggregation '{name}'"))),
        }
    }
}

pub(crate) fn parse<T: DeserializeOwned>(response: Value) -> Result<SearchResponse<T>> {
    serde_json::from_value(response)
        .or_raise(|| ErrorKind::MalformedResponse("unexpected search response shape".to_string()))
}
