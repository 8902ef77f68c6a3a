//! Retry module for the table indexer.
//!
//! Drives a single chunk to a terminal state: written, quarantined after too
//! many transport faults, or quarantined and raised on an unrecognised error.

use std::sync::Arc;

use table_indexer_repository::{SearchIndexError, WriteOutcome};
use tracing::{error, info, warn};

use crate::config::{pause, PacingPolicy};
use crate::errors::PipelineError;
use crate::quarantine::{location_key, QuarantineReceipt, QuarantineSink};
use crate::writer::{classify, Chunk, ChunkClassification, ChunkWriter};

/// Terminal state of a chunk that did not fail fatally.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkResolution {
    /// The request went through. Document failures, if any, are in `outcome`.
    Succeeded { outcome: WriteOutcome, attempts: u32 },
    /// The retry budget ran out; no row of the chunk is counted as written.
    Quarantined {
        receipt: QuarantineReceipt,
        attempts: u32,
    },
}

/// Retries chunks on transport faults and quarantines what cannot be written.
pub struct RetryCoordinator {
    writer: ChunkWriter,
    sink: Arc<dyn QuarantineSink>,
    index: String,
    retry_limit: u32,
    pacing: PacingPolicy,
}

impl RetryCoordinator {
    pub fn new(
        writer: ChunkWriter,
        sink: Arc<dyn QuarantineSink>,
        index: impl Into<String>,
        retry_limit: u32,
        pacing: PacingPolicy,
    ) -> Self {
        Self {
            writer,
            sink,
            index: index.into(),
            retry_limit,
            pacing,
        }
    }

    /// Write `chunk`, retrying transport faults up to `retry_limit` times.
    ///
    /// # Errors
    ///
    /// * `PipelineError::FatalChunk` - An unrecognised error; the rows were quarantined first
    /// * `PipelineError::QuarantineError` - The rows could not be quarantined
    pub async fn run(&self, chunk: &Chunk) -> Result<ChunkResolution, PipelineError> {
        let mut retries: u32 = 0;

        loop {
            let attempts = retries + 1;
            let result = self.writer.write(chunk).await;

            match (classify(&result), result) {
                (ChunkClassification::TransportFault, result) => {
                    let reason = fault_reason(&result);
                    if retries >= self.retry_limit {
                        let receipt = self.quarantine(chunk).await?;
                        warn!(
                            chunk = chunk.sequence,
                            rows = chunk.len(),
                            attempts,
                            location = %receipt.location,
                            reason = %reason,
                            "Retry limit reached, chunk quarantined"
                        );
                        return Ok(ChunkResolution::Quarantined { receipt, attempts });
                    }

                    retries += 1;
                    let delay = self.pacing.retry_delay(retries);
                    info!(
                        chunk = chunk.sequence,
                        retry = retries,
                        retry_limit = self.retry_limit,
                        delay_secs = delay.as_secs(),
                        reason = %reason,
                        "Transport fault, retrying chunk"
                    );
                    pause(delay).await;
                }
                (_, Ok(outcome)) => {
                    return Ok(ChunkResolution::Succeeded { outcome, attempts });
                }
                (_, Err(source)) => {
                    let receipt = self.quarantine(chunk).await?;
                    error!(
                        chunk = chunk.sequence,
                        rows = chunk.len(),
                        location = %receipt.location,
                        error = %source,
                        "Unrecognised write error, chunk quarantined"
                    );
                    return Err(PipelineError::FatalChunk {
                        sequence: chunk.sequence,
                        rows: receipt.rows,
                        location: receipt.location,
                        source,
                    });
                }
            }
        }
    }

    /// Persist every row of `chunk` to a fresh quarantine location.
    pub async fn quarantine(&self, chunk: &Chunk) -> Result<QuarantineReceipt, PipelineError> {
        self.sink
            .persist(&chunk.actions, &location_key(&self.index))
            .await
    }
}

fn fault_reason(result: &Result<WriteOutcome, SearchIndexError>) -> String {
    match result {
        Ok(outcome) => format!(
            "{} documents failed with transport errors",
            outcome.failed_items.len()
        ),
        Err(e) => e.to_string(),
    }
}
