//! Dependency initialization and wiring for the table indexer.

use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::RunMetadata;
use crate::orchestrator::PipelineOrchestrator;
use crate::quarantine::FileQuarantineSink;
use crate::source::JsonLinesSource;
use crate::IndexingError;
use table_indexer_repository::OpenSearchProvider;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Connection mode for OpenSearch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry connection until successful.
    Retry,
}

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: PipelineOrchestrator,
}

impl ConnectionMode {
    /// Parse a connection mode.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Defaults to "retry" if not set or invalid.
    fn parse(value: Option<&str>) -> Self {
        match value.unwrap_or("retry").to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!("Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }

    fn from_env() -> Self {
        Self::parse(env::var("OPENSEARCH_CONNECTION_MODE").ok().as_deref())
    }
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `OPENSEARCH_CONNECTION_MODE`: Connection mode - "fail-fast" or "retry" (default: retry)
    /// - `OPENSEARCH_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    /// - Run settings, see [`RunMetadata::from_env`]
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If configuration is invalid, or the cluster is
    ///   unreachable in fail-fast mode
    pub async fn new() -> Result<Self, IndexingError> {
        let metadata = RunMetadata::from_env()?;

        let opensearch_url =
            env::var("OPENSEARCH_URL").unwrap_or_else(|_| DEFAULT_OPENSEARCH_URL.to_string());
        let connection_mode = ConnectionMode::from_env();
        let retry_interval = env::var("OPENSEARCH_RETRY_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_INTERVAL_SECS);

        info!(
            opensearch_url = %opensearch_url,
            index = %metadata.index_name,
            run_mode = %metadata.run_mode,
            as_of_date = %metadata.as_of_date,
            connection_mode = ?connection_mode,
            retry_interval_secs = retry_interval,
            "Initializing dependencies"
        );

        let search_provider = Self::connect_to_opensearch(
            &opensearch_url,
            connection_mode,
            Duration::from_secs(retry_interval),
        )
        .await?;

        info!("OpenSearch connection established");

        let source = JsonLinesSource::new(metadata.source_location.clone());
        let sink = FileQuarantineSink::new(metadata.quarantine_dir.clone());

        let orchestrator = PipelineOrchestrator::new(
            metadata,
            Arc::new(source),
            Arc::new(search_provider),
            Arc::new(sink),
        );

        Ok(Self { orchestrator })
    }

    /// Connect to OpenSearch with retry logic based on connection mode.
    async fn connect_to_opensearch(
        url: &str,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<OpenSearchProvider, IndexingError> {
        loop {
            match Self::try_connect_opensearch(url).await {
                Ok(provider) => return Ok(provider),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(IndexingError::config(format!(
                            "Failed to connect to OpenSearch: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            opensearch_url = %url,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to OpenSearch, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }

    /// Attempt to connect to OpenSearch and check that it answers.
    async fn try_connect_opensearch(url: &str) -> Result<OpenSearchProvider, IndexingError> {
        let search_provider = OpenSearchProvider::new(url).await.map_err(|e| {
            IndexingError::config(format!("Failed to create OpenSearch provider: {}", e))
        })?;

        search_provider
            .ping()
            .await
            .map_err(|e| IndexingError::config(format!("OpenSearch did not answer: {}", e)))?;

        Ok(search_provider)
    }
}
