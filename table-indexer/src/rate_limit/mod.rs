//! Rate-limit recovery.
//!
//! A chunk whose first failed document was throttled is written again as
//! three smaller sub-chunks, one after the other, with a pause after each.
//! The split happens once; sub-chunks are never split further.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{pause, PacingPolicy};
use crate::errors::PipelineError;
use crate::retry::{ChunkResolution, RetryCoordinator};
use crate::writer::Chunk;

/// What the sub-chunk writes of one recovered chunk achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryOutcome {
    /// Rows written successfully across all sub-chunks.
    pub recovered: usize,
    /// Rows of sub-chunks that exhausted their retries.
    pub quarantined_rows: usize,
    pub quarantined_chunks: usize,
}

/// Re-writes rate-limited chunks in smaller pieces.
pub struct RateLimitRecovery {
    coordinator: Arc<RetryCoordinator>,
    pacing: PacingPolicy,
}

impl RateLimitRecovery {
    pub fn new(coordinator: Arc<RetryCoordinator>, pacing: PacingPolicy) -> Self {
        Self {
            coordinator,
            pacing,
        }
    }

    /// Re-write every row of `chunk`, not just the failed ones.
    ///
    /// # Errors
    ///
    /// * `PipelineError::RateLimitUnrecovered` - A sub-chunk still reported failed documents
    /// * `PipelineError::RecoveryMismatch` - Written and quarantined rows do not add up to the chunk
    /// * Any error raised by the retry coordinator
    pub async fn recover(&self, chunk: &Chunk) -> Result<RecoveryOutcome, PipelineError> {
        let parts = chunk.split_thirds();
        info!(
            chunk = chunk.sequence,
            rows = chunk.len(),
            sub_chunks = parts.len(),
            "Rate limited, splitting chunk"
        );

        let mut recovery = RecoveryOutcome::default();
        for (i, part) in parts.iter().enumerate() {
            match self.coordinator.run(part).await? {
                ChunkResolution::Succeeded { outcome, .. } => {
                    let failed = outcome.failed_items.len() + outcome.unaccounted();
                    if failed > 0 {
                        warn!(
                            chunk = chunk.sequence,
                            sub_chunk = i,
                            failed,
                            "Sub-chunk still failing after split"
                        );
                        return Err(PipelineError::RateLimitUnrecovered {
                            sequence: chunk.sequence,
                            failed,
                        });
                    }
                    recovery.recovered += outcome.success_count;
                }
                ChunkResolution::Quarantined { receipt, .. } => {
                    recovery.quarantined_rows += receipt.rows;
                    recovery.quarantined_chunks += 1;
                }
            }
            pause(self.pacing.recovery_delay(i)).await;
        }

        let accounted = recovery.recovered + recovery.quarantined_rows;
        if accounted != chunk.len() {
            return Err(PipelineError::RecoveryMismatch {
                sequence: chunk.sequence,
                expected: chunk.len(),
                actual: accounted,
            });
        }

        info!(
            chunk = chunk.sequence,
            recovered = recovery.recovered,
            quarantined = recovery.quarantined_rows,
            "Rate-limited chunk recovered"
        );
        Ok(recovery)
    }
}
