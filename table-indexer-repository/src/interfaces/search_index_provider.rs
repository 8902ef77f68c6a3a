//! Index client trait definition.
//!
//! This module defines the abstract interface for index operations consumed by
//! the ingestion pipeline, allowing for different backend implementations
//! (OpenSearch, Elasticsearch, in-memory mocks).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use table_indexer_shared::DocumentAction;

use crate::errors::SearchIndexError;
use crate::types::{SearchPage, WriteOutcome};

/// Abstracts the underlying search index implementation.
///
/// Implementations are shared between concurrent chunk writers, so every
/// method takes `&self` and must be safe to call from many tasks at once.
///
/// All methods return `Result<T, SearchIndexError>` for consistent error handling across
/// different backend implementations.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Write a sequence of per-document actions in a single bulk request.
    ///
    /// Documents rejected by the backend are reported in
    /// `WriteOutcome::failed_items`; this never fails because some documents
    /// did. An error means the request as a whole did not go through.
    ///
    /// # Arguments
    ///
    /// * `actions` - The actions to send, each carrying its own target index
    /// * `timeout` - Client-side timeout for the whole request
    ///
    /// # Returns
    ///
    /// * `Ok(WriteOutcome)` - Per-document success and failure
    /// * `Err(SearchIndexError::TransportError)` - A transient fault; the request may be retried
    /// * `Err(SearchIndexError)` - Any other failure, not worth retrying
    async fn bulk_write(
        &self,
        actions: &[DocumentAction],
        timeout: Duration,
    ) -> Result<WriteOutcome, SearchIndexError>;

    /// Count the documents in an index.
    async fn count(&self, index: &str) -> Result<u64, SearchIndexError>;

    /// Make every write acknowledged so far visible to search.
    async fn refresh(&self, index: &str) -> Result<(), SearchIndexError>;

    /// Run a query and return up to `size` matching documents.
    ///
    /// `SearchPage::total` reports every match, not just the returned page.
    async fn search_by_query(
        &self,
        index: &str,
        query: &Value,
        size: usize,
    ) -> Result<SearchPage, SearchIndexError>;

    /// Delete every document matching a query.
    ///
    /// # Returns
    ///
    /// * `Ok(u64)` - The number of documents deleted
    /// * `Err(SearchIndexError)` - If the request fails
    async fn delete_by_query(&self, index: &str, query: &Value) -> Result<u64, SearchIndexError>;
}
