//! # Table Indexer
//!
//! Synchronizes a snapshot of a source table into an OpenSearch index. Rows
//! are turned into document actions, written in bounded concurrent bulk
//! chunks, retried on transport faults and quarantined when they cannot be
//! written.
//!
//! ## Architecture
//!
//! 1. **Source**: Materializes the table snapshot and slices it into pages
//! 2. **Transformer**: Maps each row to an index or upsert action
//! 3. **Dispatcher**: Writes a page as concurrent chunk requests
//! 4. **Retry**: Retries a chunk on transport faults, quarantining what fails
//! 5. **Rate limit**: Re-writes throttled chunks in thirds
//! 6. **Reconciliation**: Deletes documents left from earlier development loads
//! 7. **Orchestrator**: Runs pages strictly in sequence and reports totals
//!
//! ## Modules
//!
//! - [`config`]: Run metadata, pacing and dependency initialization
//! - [`source`]: Source table readers
//! - [`transformer`]: Row to document action mapping
//! - [`writer`]: Chunking and single-request writes
//! - [`retry`]: Per-chunk retry and quarantine
//! - [`rate_limit`]: Rate-limit recovery
//! - [`dispatcher`]: Bounded concurrent page writes
//! - [`quarantine`]: Out-of-band storage for unwritable chunks
//! - [`reconciliation`]: Post-load stray document cleanup
//! - [`orchestrator`]: Coordinates a run
//! - [`errors`]: Error types for the pipeline

pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod orchestrator;
pub mod quarantine;
pub mod rate_limit;
pub mod reconciliation;
pub mod retry;
pub mod source;
pub mod transformer;
pub mod writer;

#[cfg(test)]
mod test_utils;

pub use config::{Dependencies, PacingPolicy, RunMetadata};
pub use dispatcher::PageSummary;
pub use errors::{PipelineError, TransformError};
pub use orchestrator::{PipelineOrchestrator, RunSummary};

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] PipelineError),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
