//! Table Indexer Main Entry Point
//!
//! Loads one table snapshot into OpenSearch and exits.

use dotenv::dotenv;
use std::env;
use table_indexer::{Dependencies, IndexingError};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("table_indexer=info,table_indexer_repository=info"));

    let json_output = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .init();

        info!(
            service_name = "table-indexer",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .init();

        info!(
            service_name = "table-indexer",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with console output"
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), IndexingError> {
    // Load environment variables from .env file
    dotenv().ok();

    init_tracing();

    info!("Starting table indexer");

    let deps = match Dependencies::new().await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    match deps.orchestrator.run().await {
        Ok(summary) => {
            if summary.failed > 0 || summary.quarantined_rows > 0 {
                warn!(
                    failed = summary.failed,
                    quarantined = summary.quarantined_rows,
                    "Table indexer completed with rows not written"
                );
            } else {
                info!(succeeded = summary.succeeded, "Table indexer completed successfully");
            }
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Table indexer failed");
            Err(e.into())
        }
    }
}
