//! Document actions derived from source rows.
//!
//! Each row becomes exactly one action against the target index. The action
//! carries the document identity, the write semantics, and the payload with
//! provenance fields already attached.

use serde::{Deserialize, Serialize};

use crate::types::row::{ColumnValue, Row};

/// Payload field holding the date the document was uploaded for.
pub const UPLOAD_DATE_FIELD: &str = "@upload_date";

/// Payload field holding the name of the process that wrote the document.
pub const PROCESS_NAME_FIELD: &str = "@upload_prcs_nm";

/// Payload field holding the soft-delete flag.
pub const DELETED_FIELD: &str = "@deleted";

/// Write semantics for a single document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Full replace of the document.
    Index,
    /// Partial update, creating the document when missing.
    Upsert,
}

/// A single per-document operation destined for a bulk write.
///
/// The serialized form is also the quarantine line format, so a quarantined
/// chunk can be read back and re-driven without the source table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAction {
    #[serde(rename = "_op")]
    pub operation: Operation,
    #[serde(rename = "_id")]
    pub document_id: String,
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_source")]
    pub payload: Row,
}

impl DocumentAction {
    pub fn new(
        operation: Operation,
        document_id: impl Into<String>,
        index: impl Into<String>,
        payload: Row,
    ) -> Self {
        Self {
            operation,
            document_id: document_id.into(),
            index: index.into(),
            payload,
        }
    }

    /// Whether the payload marks this document as soft deleted.
    pub fn is_deleted(&self) -> bool {
        matches!(
            self.payload.get(DELETED_FIELD),
            Some(ColumnValue::Bool(true))
        )
    }
}
