//! Request and response types for index client operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification of a single failed document in a bulk write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The backend is throttling writes.
    RateLimited,
    /// A transient backend or network fault.
    TransportError,
    /// The document itself is invalid (mapping conflict, malformed value).
    DocumentRejected,
    /// Anything the classifier does not recognise.
    Unknown,
}

/// Outcome of one failed document within a bulk write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDetail {
    pub kind: FailureKind,
    /// Identity of the offending document, when the backend reported it.
    pub document_id: Option<String>,
    /// Per-item HTTP status, when reported.
    pub status: Option<u16>,
    /// Backend error type and reason, when reported.
    pub reason: Option<String>,
}

impl FailureDetail {
    pub fn new(kind: FailureKind, document_id: Option<String>) -> Self {
        Self {
            kind,
            document_id,
            status: None,
            reason: None,
        }
    }
}

/// Result of one bulk write attempt.
///
/// Partial failure is represented here rather than as an error:
/// `success_count + failed_items.len() <= submitted` always holds, the gap
/// being documents the backend did not report on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriteOutcome {
    /// Number of documents written successfully.
    pub success_count: usize,
    /// Failed documents, in the order the backend reported them.
    pub failed_items: Vec<FailureDetail>,
    /// Number of documents sent in the request.
    pub submitted: usize,
}

impl WriteOutcome {
    /// An outcome in which every submitted document succeeded.
    pub fn all_succeeded(submitted: usize) -> Self {
        Self {
            success_count: submitted,
            failed_items: Vec::new(),
            submitted,
        }
    }

    /// Classification of the first failure, taken as representative of the chunk.
    pub fn first_failure_kind(&self) -> Option<FailureKind> {
        self.failed_items.first().map(|f| f.kind)
    }

    /// Whether any failed document carries the given classification.
    pub fn has_failure_kind(&self, kind: FailureKind) -> bool {
        self.failed_items.iter().any(|f| f.kind == kind)
    }

    /// Documents that neither succeeded nor were reported as failed.
    pub fn unaccounted(&self) -> usize {
        self.submitted
            .saturating_sub(self.success_count + self.failed_items.len())
    }
}

/// Summary of one document returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub index: String,
    pub source: Value,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchPage {
    /// Total number of matching documents, which may exceed `hits.len()`.
    pub total: u64,
    pub hits: Vec<DocumentSummary>,
}
