//! Newline-delimited JSON table reader.
//!
//! A snapshot is either a single `.jsonl` file or a directory of part files,
//! read in lexical file-name order. Every non-blank line is one row object.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use table_indexer_shared::Row;
use tokio::fs;
use tracing::{debug, info};

use crate::errors::PipelineError;
use crate::source::TableSource;

/// Reads a table snapshot stored as JSON lines.
pub struct JsonLinesSource {
    location: PathBuf,
}

impl JsonLinesSource {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// List the part files making up the snapshot.
    async fn part_files(&self) -> Result<Vec<PathBuf>, PipelineError> {
        let metadata = fs::metadata(&self.location).await.map_err(|e| {
            PipelineError::source_error(format!("{}: {}", self.location.display(), e))
        })?;

        if metadata.is_file() {
            return Ok(vec![self.location.clone()]);
        }

        let mut entries = fs::read_dir(&self.location).await.map_err(|e| {
            PipelineError::source_error(format!("{}: {}", self.location.display(), e))
        })?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::source_error(e.to_string()))?
        {
            let path = entry.path();
            if is_part_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn is_part_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("jsonl") | Some("ndjson") | Some("json")
    )
}

#[async_trait]
impl TableSource for JsonLinesSource {
    async fn scan(&self) -> Result<Vec<Row>, PipelineError> {
        let files = self.part_files().await?;
        let mut rows = Vec::new();

        for file in &files {
            let content = fs::read_to_string(file).await.map_err(|e| {
                PipelineError::source_error(format!("{}: {}", file.display(), e))
            })?;

            let before = rows.len();
            for (line_no, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let row: Row = serde_json::from_str(line).map_err(|e| {
                    PipelineError::source_error(format!(
                        "{}:{}: {}",
                        file.display(),
                        line_no + 1,
                        e
                    ))
                })?;
                rows.push(row);
            }
            debug!(file = %file.display(), rows = rows.len() - before, "Read part file");
        }

        info!(
            location = %self.location.display(),
            files = files.len(),
            records = rows.len(),
            "Read source table"
        );
        Ok(rows)
    }
}
