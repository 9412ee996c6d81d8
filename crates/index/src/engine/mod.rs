//! Search engine trait and implementations.
//!
//! The [`SearchEngine`] trait is the narrow slice of an Elasticsearch-style
//! REST API that the index manager and query engine need: collection
//! lifecycle, bulk writes, delete-by-query, search and multi-search. Request
//! and response bodies are plain JSON; shaping them is the caller's job.

mod http;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::http::HttpEngine;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::{Call, MockEngine};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub type EngineHandle = Arc<dyn SearchEngine + Send + Sync>;

/// One document write inside a bulk request.
#[derive(Clone, Debug, PartialEq)]
pub struct BulkOperation {
    pub index: String,
    pub id: String,
    pub document: Value,
}

/// Unified interface for full-text search engines.
///
/// Every method is a single round trip. Implementations must not retry.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn index_exists(&self, index: &str) -> Result<bool>;

    async fn create_index(&self, index: &str) -> Result<()>;

    async fn close_index(&self, index: &str) -> Result<()>;

    async fn open_index(&self, index: &str) -> Result<()>;

    /// Settings are applied while the collection is closed, so static
    /// analysis settings are accepted.
    async fn put_settings(&self, index: &str, settings: &Value) -> Result<()>;

    async fn put_mapping(&self, index: &str, mapping: &Value) -> Result<()>;

    async fn delete_index(&self, index: &str) -> Result<()>;

    /// Deletes every document matching `query` and makes the deletion
    /// visible to subsequent searches. Returns the number of deleted documents.
    async fn delete_by_query(&self, index: &str, query: &Value) -> Result<u64>;

    /// Writes all operations in one request and makes them visible to
    /// subsequent searches. Any failed item fails the whole call.
    async fn bulk(&self, operations: Vec<BulkOperation>) -> Result<()>;

    async fn search(&self, index: &str, body: &Value) -> Result<Value>;

    /// Runs several searches in one round trip; responses keep request order.
    async fn msearch(&self, requests: Vec<(String, Value)>) -> Result<Vec<Value>>;
}
