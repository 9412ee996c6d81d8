//! Elasticsearch-compatible REST engine.

use super::{BulkOperation, SearchEngine};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::instrument;

const NDJSON: &str = "application/x-ndjson";

/// [`SearchEngine`] speaking the Elasticsearch REST protocol over `reqwest`.
///
/// Writes are issued with refresh semantics (`refresh=true` for
/// delete-by-query, `refresh=wait_for` for bulk) so a completed re-index is
/// immediately searchable.
pub struct HttpEngine {
    base_url: String,
    client: Client,
}

impl HttpEngine {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .or_raise(|| ErrorKind::Unavailable("could not build HTTP client".to_string()))?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}/{}", self.base_url, path))
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .or_raise(|| ErrorKind::Unavailable(format!("{operation} request to {} failed", self.base_url)))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let reason = response.text().await.unwrap_or_default();
        exn::bail!(ErrorKind::Rejected {
            operation,
            status: status.as_u16(),
            reason,
        })
    }

    async fn send_json(&self, operation: &'static str, request: RequestBuilder) -> Result<Value> {
        self.send(operation, request)
            .await?
            .json::<Value>()
            .await
            .or_raise(|| ErrorKind::MalformedResponse(format!("{operation} response is not JSON")))
    }
}

/// Newline-delimited JSON body, as expected by `_bulk` and `_msearch`.
fn ndjson(lines: impl IntoIterator<Item = Value>) -> String {
    let mut body = String::new();
    for line in lines {
        body.push_str(&line.to_string());
        body.push('\n');
    }
    body
}

/// First failure reason reported by a `_bulk` response, if any.
fn bulk_failure(response: &Value) -> Option<String> {
    if !response.get("errors").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }
    let reason = response
        .get("items")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.as_object()?.values().next()?.get("error"))
        .map(|error| error.get("reason").and_then(Value::as_str).map(str::to_string).unwrap_or_else(|| error.to_string()))
        .next();
    Some(reason.unwrap_or_else(|| "unknown bulk item failure".to_string()))
}

#[async_trait]
impl SearchEngine for HttpEngine {
    fn name(&self) -> &str {
        &self.base_url
    }

    #[instrument(level = "trace", skip(self))]
    async fn index_exists(&self, index: &str) -> Result<bool> {
        let response = self
            .request(Method::HEAD, index)
            .send()
            .await
            .or_raise(|| ErrorKind::Unavailable(format!("exists request to {} failed", self.base_url)))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => exn::bail!(ErrorKind::Rejected {
                operation: "exists",
                status: status.as_u16(),
                reason: format!("unexpected status for HEAD /{index}"),
            }),
        }
    }

    #[instrument(level = "trace", skip(self))]
    async fn create_index(&self, index: &str) -> Result<()> {
        self.send("create index", self.request(Method::PUT, index)).await.map(|_| ())
    }

    #[instrument(level = "trace", skip(self))]
    async fn close_index(&self, index: &str) -> Result<()> {
        self.send("close index", self.request(Method::POST, &format!("{index}/_close"))).await.map(|_| ())
    }

    #[instrument(level = "trace", skip(self))]
    async fn open_index(&self, index: &str) -> Result<()> {
        self.send("open index", self.request(Method::POST, &format!("{index}/_open"))).await.map(|_| ())
    }

    #[instrument(level = "trace", skip(self, settings))]
    async fn put_settings(&self, index: &str, settings: &Value) -> Result<()> {
        let request = self.request(Method::PUT, &format!("{index}/_settings")).json(settings);
        self.send("put settings", request).await.map(|_| ())
    }

    #[instrument(level = "trace", skip(self, mapping))]
    async fn put_mapping(&self, index: &str, mapping: &Value) -> Result<()> {
        let request = self.request(Method::PUT, &format!("{index}/_mapping")).json(mapping);
        self.send("put mapping", request).await.map(|_| ())
    }

    #[instrument(level = "trace", skip(self))]
    async fn delete_index(&self, index: &str) -> Result<()> {
        self.send("delete index", self.request(Method::DELETE, index)).await.map(|_| ())
    }

    #[instrument(level = "trace", skip(self, query))]
    async fn delete_by_query(&self, index: &str, query: &Value) -> Result<u64> {
        let request = self
            .request(Method::POST, &format!("{index}/_delete_by_query?refresh=true&conflicts=proceed"))
            .json(&json!({ "query": query }));
        let response = self.send_json("delete by query", request).await?;
        if let Some(failure) = response.get("failures").and_then(Value::as_array).and_then(|f| f.first()) {
            exn::bail!(ErrorKind::PartialFailure {
                operation: "delete by query",
                reason: failure.to_string(),
            });
        }
        response
            .get("deleted")
            .and_then(Value::as_u64)
            .ok_or_raise(|| ErrorKind::MalformedResponse("delete by query response lacks 'deleted'".to_string()))
    }

    #[instrument(level = "trace", skip_all, fields(operations = operations.len()))]
    async fn bulk(&self, operations: Vec<BulkOperation>) -> Result<()> {
        let lines = operations.into_iter().flat_map(|op| {
            [
                json!({ "index": { "_index": op.index, "_id": op.id } }),
                op.document,
            ]
        });
        let request = self
            .request(Method::POST, "_bulk?refresh=wait_for")
            .header(reqwest::header::CONTENT_TYPE, NDJSON)
            .body(ndjson(lines));
        let response = self.send_json("bulk", request).await?;
        if let Some(reason) = bulk_failure(&response) {
            exn::bail!(ErrorKind::PartialFailure {
                operation: "bulk",
                reason,
            });
        }
        Ok(())
    }

    #[instrument(level = "trace", skip(self, body))]
    async fn search(&self, index: &str, body: &Value) -> Result<Value> {
        tracing::trace!(%body, "search request");
        let request = self.request(Method::POST, &format!("{index}/_search")).json(body);
        self.send_json("search", request).await
    }

    #[instrument(level = "trace", skip_all, fields(requests = requests.len()))]
    async fn msearch(&self, requests: Vec<(String, Value)>) -> Result<Vec<Value>> {
        let expected = requests.len();
        let lines = requests.into_iter().flat_map(|(index, body)| [json!({ "index": index }), body]);
        let request = self
            .request(Method::POST, "_msearch")
            .header(reqwest::header::CONTENT_TYPE, NDJSON)
            .body(ndjson(lines));
        let response = self.send_json("multi search", request).await?;
        let responses = match response.get("responses").and_then(Value::as_array) {
            Some(responses) if responses.len() == expected => responses.clone(),
            _ => exn::bail!(ErrorKind::MalformedResponse(format!("expected {expected} multi search responses"))),
        };
        if let Some(error) = responses.iter().find_map(|r| r.get("error")) {
            exn::bail!(ErrorKind::PartialFailure {
                operation: "multi search",
                reason: error.to_string(),
            });
        }
        Ok(responses)
    }
}
