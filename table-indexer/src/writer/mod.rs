//! Writer module for the table indexer.
//!
//! Cuts a page of document actions into chunks and sends each chunk as one
//! bulk request.

use std::sync::Arc;
use std::time::Duration;

use table_indexer_repository::{FailureKind, SearchIndexError, SearchIndexProvider, WriteOutcome};
use table_indexer_shared::DocumentAction;
use tracing::debug;

/// A contiguous slice of a page, written as a single bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Position of the chunk within its page.
    pub sequence: usize,
    pub actions: Vec<DocumentAction>,
}

impl Chunk {
    pub fn new(sequence: usize, actions: Vec<DocumentAction>) -> Self {
        Self { sequence, actions }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Split into at most three contiguous sub-chunks of `ceil(n / 3)` rows.
    ///
    /// Sub-chunks keep the parent's sequence number.
    pub fn split_thirds(&self) -> Vec<Chunk> {
        let size = self.len().div_ceil(3).max(1);
        self.actions
            .chunks(size)
            .map(|part| Chunk::new(self.sequence, part.to_vec()))
            .collect()
    }
}

/// Cut `actions` into chunks of at most `chunk_rows` actions, preserving order.
pub fn into_chunks(actions: Vec<DocumentAction>, chunk_rows: usize) -> Vec<Chunk> {
    let chunk_rows = chunk_rows.max(1);
    let mut chunks = Vec::with_capacity(actions.len().div_ceil(chunk_rows));
    let mut remaining = actions.into_iter().peekable();

    while remaining.peek().is_some() {
        let actions: Vec<DocumentAction> = remaining.by_ref().take(chunk_rows).collect();
        chunks.push(Chunk::new(chunks.len(), actions));
    }
    chunks
}

/// How a single write attempt should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkClassification {
    /// Every document was written.
    Clean,
    /// Some documents failed; the kind is that of the first failure.
    DocumentFailures(FailureKind),
    /// The whole chunk should be retried.
    TransportFault,
    /// Unrecognised error; the chunk is quarantined and the page aborted.
    Fatal,
}

/// Interpret the result of a bulk write.
///
/// A document failure classified as a transport error taints the whole chunk:
/// partial successes are discarded and the chunk is retried.
pub fn classify(result: &Result<WriteOutcome, SearchIndexError>) -> ChunkClassification {
    match result {
        Ok(outcome) if outcome.has_failure_kind(FailureKind::TransportError) => {
            ChunkClassification::TransportFault
        }
        Ok(outcome) => match outcome.first_failure_kind() {
            Some(kind) => ChunkClassification::DocumentFailures(kind),
            None => ChunkClassification::Clean,
        },
        Err(e) if e.is_retryable() => ChunkClassification::TransportFault,
        Err(_) => ChunkClassification::Fatal,
    }
}

/// Sends chunks to the index.
pub struct ChunkWriter {
    provider: Arc<dyn SearchIndexProvider>,
    timeout: Duration,
}

impl ChunkWriter {
    pub fn new(provider: Arc<dyn SearchIndexProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Write one chunk as a single bulk request.
    ///
    /// Partially failed chunks are reported through the outcome; only an
    /// unusable request is an error.
    pub async fn write(&self, chunk: &Chunk) -> Result<WriteOutcome, SearchIndexError> {
        debug!(chunk = chunk.sequence, rows = chunk.len(), "Writing chunk");
        self.provider.bulk_write(&chunk.actions, self.timeout).await
    }
}
