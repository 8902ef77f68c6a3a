//! Error types for the table indexer pipeline.

use table_indexer_repository::SearchIndexError;
use thiserror::Error;

use crate::dispatcher::PageSummary;

/// A source row that cannot be turned into a document action.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// The identity column is absent or null.
    #[error("Row has no value in identity column '{0}'")]
    MissingIdentity(String),

    /// The identity column holds a value that cannot name a document.
    #[error("Identity column '{column}' holds an unusable value: {value}")]
    InvalidIdentity { column: String, value: String },

    /// The update marker is present but is not a date.
    #[error("Update marker column '{column}' holds a non-date value: {value}")]
    InvalidUpdateMarker { column: String, value: String },

    /// Two source columns differ only in case.
    #[error("Column '{0}' appears more than once when names are lower-cased")]
    DuplicateColumn(String),
}

/// Errors that can occur in the ingestion pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A row could not be transformed.
    #[error("Transform error: {0}")]
    TransformError(#[from] TransformError),

    /// The source table could not be read.
    #[error("Source error: {0}")]
    SourceError(String),

    /// Rows could not be persisted to the quarantine location.
    #[error("Quarantine error: {0}")]
    QuarantineError(String),

    /// An index client call outside of chunk writing failed.
    #[error("Index error: {0}")]
    IndexError(#[from] SearchIndexError),

    /// A chunk hit an unclassified error. Its rows were quarantined first.
    #[error("Chunk {sequence} failed fatally, {rows} rows quarantined at {location}: {source}")]
    FatalChunk {
        sequence: usize,
        rows: usize,
        location: String,
        source: SearchIndexError,
    },

    /// Splitting a rate-limited chunk did not clear the failures.
    #[error("Rate-limit recovery of chunk {sequence} still had {failed} failed documents")]
    RateLimitUnrecovered { sequence: usize, failed: usize },

    /// Rate-limit recovery wrote a different number of rows than it was given.
    #[error("Rate-limit recovery of chunk {sequence} wrote {actual} of {expected} rows")]
    RecoveryMismatch {
        sequence: usize,
        expected: usize,
        actual: usize,
    },

    /// A page was aborted by a fatal chunk. `summary` holds what completed.
    #[error("Page {page} aborted: {source}")]
    PageAborted {
        page: usize,
        summary: PageSummary,
        source: Box<PipelineError>,
    },

    /// A worker task could not be joined.
    #[error("Worker error: {0}")]
    WorkerError(String),
}

impl PipelineError {
    /// Create a source error.
    pub fn source_error(msg: impl Into<String>) -> Self {
        Self::SourceError(msg.into())
    }

    /// Create a quarantine error.
    pub fn quarantine(msg: impl Into<String>) -> Self {
        Self::QuarantineError(msg.into())
    }

    /// Create a worker error.
    pub fn worker(msg: impl Into<String>) -> Self {
        Self::WorkerError(msg.into())
    }
}
