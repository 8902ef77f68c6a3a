//! Index client error types.
//!
//! This module defines the unified error type for all index client
//! operations. The variants split into one retryable class (transport faults)
//! and everything else, which callers must treat as fatal.

use thiserror::Error;

/// Unified errors from index client operations.
///
/// Used by the `SearchIndexProvider` trait for every operation. Per-document
/// rejections inside a bulk write are not errors; they are reported through
/// `WriteOutcome::failed_items`.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// Invalid input (e.g., empty index name).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to build a connection to the search backend.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Transient network or backend fault. Safe to retry.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// The bulk request was refused as a whole for a non-transient reason.
    #[error("Bulk index error: {0}")]
    BulkIndexError(String),

    /// A count, refresh, search or delete-by-query request failed.
    #[error("Query error: {0}")]
    QueryError(String),

    /// Failed to parse a response from the search backend.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize data for the search backend.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Unknown error.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SearchIndexError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }

    /// Create a bulk index error.
    pub fn bulk_index(msg: impl Into<String>) -> Self {
        Self::BulkIndexError(msg.into())
    }

    /// Create a query error.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::QueryError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create an unknown error.
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    /// Whether the failed request may succeed if sent again unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_errors_are_retryable() {
        assert!(SearchIndexError::transport("connection reset").is_retryable());
        assert!(!SearchIndexError::bulk_index("400 bad request").is_retryable());
        assert!(!SearchIndexError::parse("missing items").is_retryable());
        assert!(!SearchIndexError::unknown("?").is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = SearchIndexError::transport("timed out");
        assert_eq!(err.to_string(), "Transport error: timed out");
    }
}
