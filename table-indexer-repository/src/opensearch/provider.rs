//! OpenSearch provider implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust crate.

use std::time::Duration;

use async_trait::async_trait;
use opensearch::{
    http::request::JsonBody,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::IndicesRefreshParts,
    BulkParts, CountParts, DeleteByQueryParts, OpenSearch, SearchParts,
};
use serde_json::{json, Value};
use table_indexer_shared::DocumentAction;
use tracing::{debug, error, info};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::bulk;
use crate::types::{SearchPage, WriteOutcome};
use crate::utils;

/// OpenSearch provider implementation.
///
/// # Example
///
/// ```ignore
/// let provider = OpenSearchProvider::new("http://localhost:9200").await?;
/// provider.ping().await?;
/// let outcome = provider.bulk_write(&actions, Duration::from_secs(60)).await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider connected to the specified URL.
    ///
    /// No request is sent; use [`OpenSearchProvider::ping`] to verify the
    /// cluster is reachable.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchProvider)` - A new provider instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub async fn new(url: &str) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(url = %url, "Created OpenSearch provider");

        Ok(Self { client })
    }

    /// Check that the cluster answers.
    pub async fn ping(&self) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .ping()
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            return Err(SearchIndexError::connection(format!(
                "Ping failed with status {}",
                status
            )));
        }
        Ok(())
    }

    /// Read a JSON body from a non-bulk response, turning error statuses into
    /// `QueryError`s.
    async fn read_json(response: Response, operation: &str) -> Result<Value, SearchIndexError> {
        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, operation, "Request failed");
            return Err(SearchIndexError::query(format!(
                "{} failed with status {}: {}",
                operation, status, error_body
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SearchIndexError::parse(format!("{} response: {}", operation, e)))
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchProvider {
    /// Write actions through the `_bulk` endpoint.
    ///
    /// Send failures and throttling/gateway statuses on the request itself are
    /// reported as `TransportError` so the caller retries the whole chunk.
    /// Other non-success statuses are `BulkIndexError`.
    async fn bulk_write(
        &self,
        actions: &[DocumentAction],
        timeout: Duration,
    ) -> Result<WriteOutcome, SearchIndexError> {
        if actions.is_empty() {
            return Ok(WriteOutcome::default());
        }

        let body: Vec<JsonBody<Value>> = bulk::build_bulk_body(actions)?
            .into_iter()
            .map(JsonBody::from)
            .collect();

        let response = self
            .client
            .bulk(BulkParts::None)
            .body(body)
            .request_timeout(timeout)
            .send()
            .await
            .map_err(|e| SearchIndexError::transport(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Bulk request failed");
            let message = format!("Bulk failed with status {}: {}", status, error_body);
            return Err(if utils::is_retryable_status(status.as_u16()) {
                SearchIndexError::transport(message)
            } else {
                SearchIndexError::bulk_index(message)
            });
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| SearchIndexError::parse(format!("Bulk response: {}", e)))?;

        let outcome = bulk::parse_bulk_response(&body, actions.len())?;

        debug!(
            submitted = outcome.submitted,
            succeeded = outcome.success_count,
            failed = outcome.failed_items.len(),
            "Bulk request completed"
        );
        Ok(outcome)
    }

    async fn count(&self, index: &str) -> Result<u64, SearchIndexError> {
        let response = self
            .client
            .count(CountParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchIndexError::query(e.to_string()))?;

        let body = Self::read_json(response, "Count").await?;
        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| SearchIndexError::parse("Count response has no count"))
    }

    async fn refresh(&self, index: &str) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchIndexError::query(e.to_string()))?;

        Self::read_json(response, "Refresh").await?;
        debug!(index = %index, "Index refreshed");
        Ok(())
    }

    async fn search_by_query(
        &self,
        index: &str,
        query: &Value,
        size: usize,
    ) -> Result<SearchPage, SearchIndexError> {
        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .size(size as i64)
            .body(json!({
                "query": query,
                "track_total_hits": true
            }))
            .send()
            .await
            .map_err(|e| SearchIndexError::query(e.to_string()))?;

        let body = Self::read_json(response, "Search").await?;
        bulk::parse_search_page(&body)
    }

    async fn delete_by_query(&self, index: &str, query: &Value) -> Result<u64, SearchIndexError> {
        let response = self
            .client
            .delete_by_query(DeleteByQueryParts::Index(&[index]))
            .body(json!({ "query": query }))
            .send()
            .await
            .map_err(|e| SearchIndexError::query(e.to_string()))?;

        let body = Self::read_json(response, "Delete by query").await?;
        let deleted = body
            .get("deleted")
            .and_then(Value::as_u64)
            .ok_or_else(|| SearchIndexError::parse("Delete by query response has no deleted"))?;

        debug!(index = %index, deleted, "Documents deleted by query");
        Ok(deleted)
    }
}
