//! Utility functions for the table indexer repository.

use crate::types::FailureKind;

/// Backend error types that signal write throttling.
const RATE_LIMIT_ERROR_TYPES: &[&str] = &[
    "es_rejected_execution_exception",
    "rejected_execution_exception",
    "circuit_breaking_exception",
    "too_many_requests",
];

/// Backend error types that signal a transient shard or node fault.
const TRANSIENT_ERROR_TYPES: &[&str] = &[
    "unavailable_shards_exception",
    "node_not_connected_exception",
    "no_shard_available_action_exception",
    "process_cluster_event_timeout_exception",
];

/// Classify a failed bulk item from its HTTP status and backend error type.
///
/// The error type wins over the status when both are present, since backends
/// report throttling under both `429` and `503`.
///
/// # Example
///
/// ```
/// use table_indexer_repository::{classify_failure, FailureKind};
///
/// assert_eq!(classify_failure(Some(429), None), FailureKind::RateLimited);
/// assert_eq!(
///     classify_failure(Some(400), Some("mapper_parsing_exception")),
///     FailureKind::DocumentRejected,
/// );
/// ```
pub fn classify_failure(status: Option<u16>, error_type: Option<&str>) -> FailureKind {
    if let Some(error_type) = error_type {
        if RATE_LIMIT_ERROR_TYPES.contains(&error_type) {
            return FailureKind::RateLimited;
        }
        if TRANSIENT_ERROR_TYPES.contains(&error_type) {
            return FailureKind::TransportError;
        }
    }

    match status {
        Some(429) => FailureKind::RateLimited,
        Some(502..=504) => FailureKind::TransportError,
        Some(400..=499) => FailureKind::DocumentRejected,
        _ => FailureKind::Unknown,
    }
}

/// Whether a whole-request HTTP status is worth retrying.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 502..=504)
}
