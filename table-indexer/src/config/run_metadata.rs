//! Run-wide configuration.
//!
//! `RunMetadata` is built once at startup and shared read-only by every
//! component for the duration of the run.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use table_indexer_shared::RunMode;

use crate::config::pacing::PacingPolicy;
use crate::IndexingError;

const DEFAULT_PAGE_ROW_LIMIT: usize = 500_000;
const DEFAULT_CHUNK_ROW_LIMIT: usize = 5_000;
const DEFAULT_CONCURRENCY_LIMIT: usize = 4;
const DEFAULT_RETRY_LIMIT: u32 = 20;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 3_800;
const DEFAULT_ID_COLUMN: &str = "es_id";
const DEFAULT_UPDATE_MARKER_COLUMN: &str = "updt_asat_dt";
const DEFAULT_BOOKKEEPING_COLUMNS: &[&str] = &["asat_dt", "updt_asat_dt", "delete_f"];
const DEFAULT_QUARANTINE_DIR: &str = "data/issues";
const DEFAULT_RECONCILE_SEARCH_SIZE: usize = 1_000;

/// Immutable description of one ingestion run.
#[derive(Debug, Clone)]
pub struct RunMetadata {
    /// File or directory holding the source table snapshot.
    pub source_location: PathBuf,
    /// Target index.
    pub index_name: String,
    /// Snapshot date the run loads.
    pub as_of_date: NaiveDate,
    /// Name stamped on every document as provenance.
    pub process_name: String,
    pub run_mode: RunMode,
    /// Rows materialized and dispatched per page.
    pub page_row_limit: usize,
    /// Rows per bulk request.
    pub chunk_row_limit: usize,
    /// Concurrent bulk requests per page.
    pub concurrency_limit: usize,
    /// Chunk-level retries before a chunk is quarantined.
    pub retry_limit: u32,
    pub request_timeout: Duration,
    pub id_column: String,
    pub update_marker_column: String,
    /// Bookkeeping columns stripped from every payload.
    pub bookkeeping_columns: Vec<String>,
    pub quarantine_dir: PathBuf,
    /// Page size for the stray-document search during reconciliation.
    pub reconcile_search_size: usize,
    pub pacing: PacingPolicy,
}

impl RunMetadata {
    /// Create run metadata with default limits, columns and pacing.
    pub fn new(
        source_location: impl Into<PathBuf>,
        index_name: impl Into<String>,
        as_of_date: NaiveDate,
        process_name: impl Into<String>,
        run_mode: RunMode,
    ) -> Self {
        Self {
            source_location: source_location.into(),
            index_name: index_name.into(),
            as_of_date,
            process_name: process_name.into(),
            run_mode,
            page_row_limit: DEFAULT_PAGE_ROW_LIMIT,
            chunk_row_limit: DEFAULT_CHUNK_ROW_LIMIT,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            retry_limit: DEFAULT_RETRY_LIMIT,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            update_marker_column: DEFAULT_UPDATE_MARKER_COLUMN.to_string(),
            bookkeeping_columns: DEFAULT_BOOKKEEPING_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            quarantine_dir: PathBuf::from(DEFAULT_QUARANTINE_DIR),
            reconcile_search_size: DEFAULT_RECONCILE_SEARCH_SIZE,
            pacing: PacingPolicy::default(),
        }
    }

    /// Load run metadata from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SOURCE_LOCATION`, `INDEX_NAME`, `AS_OF_DATE` (`YYYYMMDD` or `YYYY-MM-DD`),
    ///   `PROCESS_NAME`: required
    /// - `RUN_MODE`: "dev" or "prod" (default: dev)
    /// - `PAGE_ROW_LIMIT`, `CHUNK_ROW_LIMIT`, `CONCURRENCY_LIMIT`, `RETRY_LIMIT`,
    ///   `REQUEST_TIMEOUT_SECS`
    /// - `ID_COLUMN`, `UPDATE_MARKER_COLUMN`, `BOOKKEEPING_COLUMNS` (comma separated)
    /// - `QUARANTINE_DIR`, `RECONCILE_SEARCH_SIZE`
    /// - `RETRY_DELAY_SECS`, `SUBMISSION_DELAY_SECS`, `PAGE_DELAY_SECS`, `RECOVERY_DELAY_SECS`
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load run metadata through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| IndexingError::config(format!("{} is required", key)))
        };

        let as_of_raw = required("AS_OF_DATE")?;
        let as_of_date = parse_as_of_date(&as_of_raw)?;

        let run_mode = match lookup("RUN_MODE") {
            Some(raw) => RunMode::from_str(&raw).map_err(|e| IndexingError::config(e))?,
            None => RunMode::default(),
        };

        let mut metadata = Self::new(
            required("SOURCE_LOCATION")?,
            required("INDEX_NAME")?,
            as_of_date,
            required("PROCESS_NAME")?,
            run_mode,
        );

        metadata.page_row_limit = parse_or(&lookup, "PAGE_ROW_LIMIT", metadata.page_row_limit)?;
        metadata.chunk_row_limit =
            parse_or(&lookup, "CHUNK_ROW_LIMIT", metadata.chunk_row_limit)?;
        metadata.concurrency_limit =
            parse_or(&lookup, "CONCURRENCY_LIMIT", metadata.concurrency_limit)?;
        metadata.retry_limit = parse_or(&lookup, "RETRY_LIMIT", metadata.retry_limit)?;
        metadata.request_timeout = Duration::from_secs(parse_or(
            &lookup,
            "REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);
        metadata.reconcile_search_size =
            parse_or(&lookup, "RECONCILE_SEARCH_SIZE", metadata.reconcile_search_size)?;

        if let Some(column) = lookup("ID_COLUMN") {
            metadata.id_column = column.trim().to_lowercase();
        }
        if let Some(column) = lookup("UPDATE_MARKER_COLUMN") {
            metadata.update_marker_column = column.trim().to_lowercase();
        }
        if let Some(columns) = lookup("BOOKKEEPING_COLUMNS") {
            metadata.bookkeeping_columns = columns
                .split(',')
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect();
        }
        if let Some(dir) = lookup("QUARANTINE_DIR") {
            metadata.quarantine_dir = PathBuf::from(dir);
        }

        let defaults = PacingPolicy::default();
        metadata.pacing = PacingPolicy {
            retry_backoff: secs_or(&lookup, "RETRY_DELAY_SECS", defaults.retry_backoff)?,
            submission_interval: secs_or(
                &lookup,
                "SUBMISSION_DELAY_SECS",
                defaults.submission_interval,
            )?,
            page_interval: secs_or(&lookup, "PAGE_DELAY_SECS", defaults.page_interval)?,
            recovery_interval: secs_or(
                &lookup,
                "RECOVERY_DELAY_SECS",
                defaults.recovery_interval,
            )?,
        };

        metadata.validate()?;
        Ok(metadata)
    }

    /// Reject limits that would stall or break the pipeline.
    pub fn validate(&self) -> Result<(), IndexingError> {
        if self.index_name.trim().is_empty() {
            return Err(IndexingError::config("index name must not be empty"));
        }
        for (name, value) in [
            ("PAGE_ROW_LIMIT", self.page_row_limit),
            ("CHUNK_ROW_LIMIT", self.chunk_row_limit),
            ("CONCURRENCY_LIMIT", self.concurrency_limit),
            ("RECONCILE_SEARCH_SIZE", self.reconcile_search_size),
        ] {
            if value == 0 {
                return Err(IndexingError::config(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }

    /// The as-of date in `yyyy-MM-dd` form, as stored in `@upload_date`.
    pub fn as_of_date_dash(&self) -> String {
        self.as_of_date.format("%Y-%m-%d").to_string()
    }
}

fn parse_as_of_date(raw: &str) -> Result<NaiveDate, IndexingError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .map_err(|e| IndexingError::config(format!("Invalid AS_OF_DATE '{}': {}", raw, e)))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, IndexingError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| IndexingError::config(format!("Invalid {} '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

fn secs_or<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, IndexingError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(lookup, key, default.as_secs()).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("SOURCE_LOCATION", "/data/products"),
        ("INDEX_NAME", "home-product"),
        ("AS_OF_DATE", "20240301"),
        ("PROCESS_NAME", "product_sync"),
    ];

    #[test]
    fn test_defaults_from_required_only() {
        let metadata = RunMetadata::from_lookup(lookup_from(REQUIRED)).unwrap();

        assert_eq!(metadata.index_name, "home-product");
        assert_eq!(metadata.as_of_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(metadata.as_of_date_dash(), "2024-03-01");
        assert_eq!(metadata.run_mode, RunMode::Development);
        assert_eq!(metadata.chunk_row_limit, 5_000);
        assert_eq!(metadata.retry_limit, 20);
        assert_eq!(metadata.request_timeout, Duration::from_secs(3_800));
        assert_eq!(metadata.id_column, "es_id");
        assert_eq!(metadata.pacing, PacingPolicy::default());
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend_from_slice(&[
            ("RUN_MODE", "prod"),
            ("AS_OF_DATE", "2024-03-02"),
            ("CHUNK_ROW_LIMIT", "250"),
            ("CONCURRENCY_LIMIT", "8"),
            ("BOOKKEEPING_COLUMNS", "ASAT_DT, load_ts,"),
            ("RETRY_DELAY_SECS", "0"),
        ]);
        let metadata = RunMetadata::from_lookup(lookup_from(&pairs)).unwrap();

        assert_eq!(metadata.run_mode, RunMode::Production);
        assert_eq!(metadata.as_of_date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!(metadata.chunk_row_limit, 250);
        assert_eq!(metadata.concurrency_limit, 8);
        assert_eq!(metadata.bookkeeping_columns, vec!["asat_dt", "load_ts"]);
        assert!(metadata.pacing.retry_backoff.is_zero());
    }

    #[test]
    fn test_missing_required_is_config_error() {
        let result = RunMetadata::from_lookup(lookup_from(&REQUIRED[1..]));
        assert!(matches!(result, Err(IndexingError::ConfigError(_))));
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RETRY_LIMIT", "many"));
        let result = RunMetadata::from_lookup(lookup_from(&pairs));
        assert!(matches!(result, Err(IndexingError::ConfigError(_))));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CHUNK_ROW_LIMIT", "0"));
        let result = RunMetadata::from_lookup(lookup_from(&pairs));
        assert!(matches!(result, Err(IndexingError::ConfigError(_))));
    }

    #[test]
    fn test_invalid_run_mode_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RUN_MODE", "staging"));
        assert!(RunMetadata::from_lookup(lookup_from(&pairs)).is_err());
    }
}
