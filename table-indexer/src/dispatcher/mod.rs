//! Dispatcher module for the table indexer.
//!
//! Writes one page of document actions as concurrent chunk requests and
//! folds the per-chunk results into a page summary.

use std::sync::Arc;

use table_indexer_repository::FailureKind;
use table_indexer_shared::DocumentAction;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use crate::config::{pause, PacingPolicy, RunMetadata};
use crate::errors::PipelineError;
use crate::rate_limit::RateLimitRecovery;
use crate::retry::{ChunkResolution, RetryCoordinator};
use crate::writer::{into_chunks, Chunk};

/// Row accounting for one page.
///
/// `succeeded + failed + quarantined_rows` equals `total_rows` for a page
/// that completed, and for an aborted page unless a worker panicked. The
/// rows of a panicked worker are reported in `lost_rows` instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSummary {
    pub total_rows: usize,
    pub succeeded: usize,
    /// Documents rejected by the index.
    pub failed: usize,
    pub quarantined_rows: usize,
    pub quarantined_chunks: usize,
    /// Chunks written again through rate-limit recovery.
    pub recovered_chunks: usize,
    /// Rows of workers that panicked; neither written nor quarantined.
    pub lost_rows: usize,
}

impl PageSummary {
    /// Rows whose fate is known.
    pub fn accounted(&self) -> usize {
        self.succeeded + self.failed + self.quarantined_rows
    }
}

/// Writes pages through a bounded pool of chunk workers.
pub struct ConcurrentDispatcher {
    coordinator: Arc<RetryCoordinator>,
    recovery: RateLimitRecovery,
    chunk_row_limit: usize,
    concurrency_limit: usize,
    pacing: PacingPolicy,
}

impl ConcurrentDispatcher {
    pub fn new(coordinator: Arc<RetryCoordinator>, metadata: &RunMetadata) -> Self {
        Self {
            recovery: RateLimitRecovery::new(Arc::clone(&coordinator), metadata.pacing),
            coordinator,
            chunk_row_limit: metadata.chunk_row_limit,
            concurrency_limit: metadata.concurrency_limit,
            pacing: metadata.pacing,
        }
    }

    /// Write one page.
    ///
    /// At most `concurrency_limit` chunks are in flight at once. A fatal chunk
    /// does not cancel its siblings: every worker is drained before the page
    /// is reported as aborted.
    ///
    /// # Errors
    ///
    /// * `PipelineError::PageAborted` - A chunk failed fatally; carries what the page achieved
    #[instrument(skip(self, actions), fields(rows = actions.len()))]
    pub async fn dispatch(
        &self,
        page: usize,
        actions: Vec<DocumentAction>,
    ) -> Result<PageSummary, PipelineError> {
        let mut summary = PageSummary {
            total_rows: actions.len(),
            ..Default::default()
        };

        let chunks = into_chunks(actions, self.chunk_row_limit);
        let chunk_count = chunks.len();
        let permits = Arc::new(Semaphore::new(self.concurrency_limit));
        let mut workers = JoinSet::new();

        for chunk in chunks {
            let permit = Arc::clone(&permits)
                .acquire_owned()
                .await
                .map_err(|e| PipelineError::worker(e.to_string()))?;
            let coordinator = Arc::clone(&self.coordinator);
            let sequence = chunk.sequence;

            workers.spawn(async move {
                let _permit = permit;
                let resolution = coordinator.run(&chunk).await;
                (chunk, resolution)
            });

            pause(self.pacing.submission_delay(sequence)).await;
        }

        info!(page, chunks = chunk_count, "All chunks submitted");

        let mut fatal: Option<PipelineError> = None;
        let mut returned_rows = 0;
        let mut panicked = false;
        while let Some(joined) = workers.join_next().await {
            let failure = match joined {
                Ok((chunk, resolution)) => {
                    returned_rows += chunk.len();
                    self.fold(&mut summary, &chunk, resolution).await
                }
                Err(e) => {
                    panicked = true;
                    Some(PipelineError::worker(e.to_string()))
                }
            };

            if let Some(e) = failure {
                error!(page, error = %e, "Chunk failed, draining remaining workers");
                if fatal.is_none() {
                    fatal = Some(e);
                }
            }
        }

        if panicked {
            summary.lost_rows = summary.total_rows - returned_rows;
            error!(page, lost_rows = summary.lost_rows, "Worker rows lost");
        }

        if let Some(source) = fatal {
            return Err(PipelineError::PageAborted {
                page,
                summary,
                source: Box::new(source),
            });
        }

        if summary.failed > 0 {
            warn!(
                page,
                failed = summary.failed,
                succeeded = summary.succeeded,
                "Page completed with failed documents"
            );
        }
        Ok(summary)
    }

    /// Add one chunk's resolution to the page summary, returning the error
    /// that should abort the page, if any.
    async fn fold(
        &self,
        summary: &mut PageSummary,
        chunk: &Chunk,
        resolution: Result<ChunkResolution, PipelineError>,
    ) -> Option<PipelineError> {
        match resolution {
            Ok(ChunkResolution::Succeeded { outcome, .. })
                if outcome.first_failure_kind() == Some(FailureKind::RateLimited) =>
            {
                match self.recovery.recover(chunk).await {
                    Ok(recovery) => {
                        summary.succeeded += recovery.recovered;
                        summary.quarantined_rows += recovery.quarantined_rows;
                        summary.quarantined_chunks += recovery.quarantined_chunks;
                        summary.recovered_chunks += 1;
                        None
                    }
                    Err(e) => {
                        match self.coordinator.quarantine(chunk).await {
                            Ok(receipt) => {
                                warn!(
                                    chunk = chunk.sequence,
                                    rows = receipt.rows,
                                    location = %receipt.location,
                                    "Rate-limit recovery failed, chunk quarantined"
                                );
                                summary.quarantined_rows += receipt.rows;
                                summary.quarantined_chunks += 1;
                            }
                            Err(q) => {
                                error!(
                                    chunk = chunk.sequence,
                                    error = %q,
                                    "Failed to quarantine unrecovered chunk"
                                );
                            }
                        }
                        Some(e)
                    }
                }
            }
            Ok(ChunkResolution::Succeeded { outcome, .. }) => {
                let failed = outcome.failed_items.len() + outcome.unaccounted();
                if failed > 0 {
                    warn!(
                        chunk = chunk.sequence,
                        failed,
                        first_failure = ?outcome.failed_items.first(),
                        "Documents rejected"
                    );
                }
                summary.succeeded += outcome.success_count;
                summary.failed += failed;
                None
            }
            Ok(ChunkResolution::Quarantined { receipt, .. }) => {
                summary.quarantined_rows += receipt.rows;
                summary.quarantined_chunks += 1;
                None
            }
            Err(e) => {
                if let PipelineError::FatalChunk { rows, .. } = &e {
                    summary.quarantined_rows += rows;
                    summary.quarantined_chunks += 1;
                }
                Some(e)
            }
        }
    }
}
