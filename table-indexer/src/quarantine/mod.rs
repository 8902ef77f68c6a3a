//! Quarantine sink for chunks that could not be written.
//!
//! Quarantined rows are persisted verbatim so an operator or a later job can
//! re-drive them. A chunk is never dropped without landing here first.

use std::path::PathBuf;

use async_trait::async_trait;
use table_indexer_shared::DocumentAction;
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use crate::errors::PipelineError;

/// Where a quarantined chunk was written and how many rows it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarantineReceipt {
    pub location: String,
    pub rows: usize,
}

/// Persists unprocessable chunks out of band.
#[async_trait]
pub trait QuarantineSink: Send + Sync {
    /// Persist `actions` under `location_key`, replacing anything already there.
    async fn persist(
        &self,
        actions: &[DocumentAction],
        location_key: &str,
    ) -> Result<QuarantineReceipt, PipelineError>;
}

/// A fresh quarantine key for a chunk bound for `index`.
pub fn location_key(index: &str) -> String {
    format!("{}-{}", index, Uuid::new_v4())
}

/// Writes each quarantined chunk to `{dir}/{location_key}.jsonl`.
pub struct FileQuarantineSink {
    dir: PathBuf,
}

impl FileQuarantineSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl QuarantineSink for FileQuarantineSink {
    async fn persist(
        &self,
        actions: &[DocumentAction],
        location_key: &str,
    ) -> Result<QuarantineReceipt, PipelineError> {
        fs::create_dir_all(&self.dir).await.map_err(|e| {
            PipelineError::quarantine(format!("{}: {}", self.dir.display(), e))
        })?;

        let mut content = String::new();
        for action in actions {
            let line = serde_json::to_string(action)
                .map_err(|e| PipelineError::quarantine(e.to_string()))?;
            content.push_str(&line);
            content.push('\n');
        }

        let path = self.dir.join(format!("{}.jsonl", location_key));
        fs::write(&path, content)
            .await
            .map_err(|e| PipelineError::quarantine(format!("{}: {}", path.display(), e)))?;

        let location = path.display().to_string();
        warn!(location = %location, rows = actions.len(), "Chunk quarantined");

        Ok(QuarantineReceipt {
            location,
            rows: actions.len(),
        })
    }
}
