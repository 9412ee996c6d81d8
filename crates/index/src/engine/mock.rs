//! In-memory search engine for testing.

use super::{BulkOperation, SearchEngine};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use tokio::sync::RwLock;

/// A recorded engine call, in the order it was made.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Exists(String),
    Create(String),
    Close(String),
    Open(String),
    PutSettings(String),
    PutMapping(String),
    DeleteIndex(String),
    DeleteByQuery(String, Value),
    Bulk(usize),
    Search(String, Value),
    MultiSearch(Vec<(String, Value)>),
}

#[derive(Default)]
struct Collection {
    open: bool,
    settings: Option<Value>,
    mapping: Option<Value>,
    documents: BTreeMap<String, Value>,
}

#[derive(Default)]
struct State {
    collections: HashMap<String, Collection>,
    calls: Vec<Call>,
    search_responses: VecDeque<Value>,
    msearch_responses: VecDeque<Vec<Value>>,
    failing: HashSet<&'static str>,
}

/// In-memory [`SearchEngine`] for testing.
///
/// Collection lifecycle, bulk writes and `term` delete-by-query are
/// simulated against an in-memory document store. Searches don't evaluate
/// queries: they replay responses queued with
/// [`push_search_response`](Self::push_search_response) and
/// [`push_msearch_response`](Self::push_msearch_response), and fail when the
/// queue is empty. Every call is recorded for later assertions.
#[derive(Default)]
pub struct MockEngine {
    state: RwLock<State>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_search_response(&self, response: Value) {
        self.state.write().await.search_responses.push_back(response);
    }

    pub async fn push_msearch_response(&self, responses: Vec<Value>) {
        self.state.write().await.msearch_responses.push_back(responses);
    }

    /// Make every subsequent call of `operation` fail (`"bulk"`, `"search"`,
    /// `"delete_by_query"`, ...).
    pub async fn fail(&self, operation: &'static str) {
        self.state.write().await.failing.insert(operation);
    }

    pub async fn recover(&self, operation: &'static str) {
        self.state.write().await.failing.remove(operation);
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.state.read().await.calls.clone()
    }

    pub async fn clear_calls(&self) {
        self.state.write().await.calls.clear();
    }

    /// Every stored document of `index`, keyed by id.
    pub async fn documents(&self, index: &str) -> Vec<Value> {
        let state = self.state.read().await;
        state.collections.get(index).map(|c| c.documents.values().cloned().collect()).unwrap_or_default()
    }

    pub async fn settings(&self, index: &str) -> Option<Value> {
        self.state.read().await.collections.get(index).and_then(|c| c.settings.clone())
    }

    pub async fn mapping(&self, index: &str) -> Option<Value> {
        self.state.read().await.collections.get(index).and_then(|c| c.mapping.clone())
    }

    pub async fn is_open(&self, index: &str) -> bool {
        self.state.read().await.collections.get(index).is_some_and(|c| c.open)
    }
}

impl State {
    fn check(&self, operation: &'static str) -> Result<()> {
        if self.failing.contains(operation) {
            exn::bail!(ErrorKind::Rejected {
                operation,
                status: 500,
                reason: "mock failure".to_string(),
            });
        }
        Ok(())
    }

    fn collection(&mut self, operation: &'static str, index: &str) -> Result<&mut Collection> {
        match self.collections.get_mut(index) {
            Some(collection) => Ok(collection),
            None => exn::bail!(ErrorKind::Rejected {
                operation,
                status: 404,
                reason: format!("no such index [{index}]"),
            }),
        }
    }
}

/// Whether `document` satisfies a `term` query (or a `bool.filter` of them).
fn matches(query: &Value, document: &Value) -> bool {
    if let Some(term) = query.get("term").and_then(Value::as_object) {
        return term.iter().all(|(field, expected)| {
            let expected = expected.get("value").unwrap_or(expected);
            document.get(field) == Some(expected)
        });
    }
    if let Some(filters) = query.pointer("/bool/filter").and_then(Value::as_array) {
        return filters.iter().all(|filter| matches(filter, document));
    }
    false
}

#[async_trait]
impl SearchEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        state.calls.push(Call::Exists(index.to_string()));
        state.check("exists")?;
        Ok(state.collections.contains_key(index))
    }

    async fn create_index(&self, index: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.calls.push(Call::Create(index.to_string()));
        state.check("create")?;
        if state.collections.contains_key(index) {
            exn::bail!(ErrorKind::Rejected {
                operation: "create index",
                status: 400,
                reason: format!("index [{index}] already exists"),
            });
        }
        state.collections.insert(
            index.to_string(),
            Collection {
                open: true,
                ..Collection::default()
            },
        );
        Ok(())
    }

    async fn close_index(&self, index: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.calls.push(Call::Close(index.to_string()));
        state.check("close")?;
        state.collection("close index", index)?.open = false;
        Ok(())
    }

    async fn open_index(&self, index: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.calls.push(Call::Open(index.to_string()));
        state.check("open")?;
        state.collection("open index", index)?.open = true;
        Ok(())
    }

    async fn put_settings(&self, index: &str, settings: &Value) -> Result<()> {
        let mut state = self.state.write().await;
        state.calls.push(Call::PutSettings(index.to_string()));
        state.check("put_settings")?;
        let collection = state.collection("put settings", index)?;
        if collection.open {
            exn::bail!(ErrorKind::Rejected {
                operation: "put settings",
                status: 400,
                reason: "can't update non dynamic settings for open indices".to_string(),
            });
        }
        collection.settings = Some(settings.clone());
        Ok(())
    }

    async fn put_mapping(&self, index: &str, mapping: &Value) -> Result<()> {
        let mut state = self.state.write().await;
        state.calls.push(Call::PutMapping(index.to_string()));
        state.check("put_mapping")?;
        state.collection("put mapping", index)?.mapping = Some(mapping.clone());
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.calls.push(Call::DeleteIndex(index.to_string()));
        state.check("delete_index")?;
        state.collection("delete index", index)?;
        state.collections.remove(index);
        Ok(())
    }

    async fn delete_by_query(&self, index: &str, query: &Value) -> Result<u64> {
        let mut state = self.state.write().await;
        state.calls.push(Call::DeleteByQuery(index.to_string(), query.clone()));
        state.check("delete_by_query")?;
        let collection = state.collection("delete by query", index)?;
        let before = collection.documents.len();
        collection.documents.retain(|_, document| !matches(query, document));
        Ok((before - collection.documents.len()) as u64)
    }

    async fn bulk(&self, operations: Vec<BulkOperation>) -> Result<()> {
        let mut state = self.state.write().await;
        state.calls.push(Call::Bulk(operations.len()));
        state.check("bulk")?;
        for operation in operations {
            let collection = state.collection("bulk", &operation.index)?;
            collection.documents.insert(operation.id, operation.document);
        }
        Ok(())
    }

    async fn search(&self, index: &str, body: &Value) -> Result<Value> {
        let mut state = self.state.write().await;
        state.calls.push(Call::Search(index.to_string(), body.clone()));
        state.check("search")?;
        match state.search_responses.pop_front() {
            Some(response) => Ok(response),
            None => exn::bail!(ErrorKind::Unavailable("no queued search response".to_string())),
        }
    }

    async fn msearch(&self, requests: Vec<(String, Value)>) -> Result<Vec<Value>> {
        let mut state = self.state.write().await;
        state.calls.push(Call::MultiSearch(requests.clone()));
        state.check("msearch")?;
        match state.msearch_responses.pop_front() {
            Some(responses) if responses.len() == requests.len() => Ok(responses),
            Some(responses) => exn::bail!(ErrorKind::MalformedResponse(format!(
                "expected {} multi search responses, got {}",
                requests.len(),
                responses.len()
            ))),
            None => exn::bail!(ErrorKind::Unavailable("no queued multi search response".to_string())),
        }
    }
}
