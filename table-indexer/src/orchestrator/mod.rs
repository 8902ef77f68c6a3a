//! Orchestrator module for the table indexer.
//!
//! Coordinates the source, transformer, dispatcher and reconciliation pass
//! for one run.

use std::sync::Arc;

use table_indexer_repository::SearchIndexProvider;
use tracing::{info, instrument, warn};

use crate::config::{pause, RunMetadata};
use crate::dispatcher::{ConcurrentDispatcher, PageSummary};
use crate::errors::PipelineError;
use crate::quarantine::QuarantineSink;
use crate::reconciliation::{ReconciliationPass, ReconciliationReport};
use crate::retry::RetryCoordinator;
use crate::source::{pages, TableSource};
use crate::transformer::RowTransformer;
use crate::writer::ChunkWriter;

/// Totals for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages: usize,
    pub total_rows: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub quarantined_rows: usize,
    pub quarantined_chunks: usize,
    pub recovered_chunks: usize,
    /// Present for development runs only.
    pub reconciliation: Option<ReconciliationReport>,
    /// Index document count after the run, when it could be read.
    pub document_count: Option<u64>,
}

impl RunSummary {
    fn absorb(&mut self, page: &PageSummary) {
        self.pages += 1;
        self.total_rows += page.total_rows;
        self.succeeded += page.succeeded;
        self.failed += page.failed;
        self.quarantined_rows += page.quarantined_rows;
        self.quarantined_chunks += page.quarantined_chunks;
        self.recovered_chunks += page.recovered_chunks;
    }
}

/// Runs one table snapshot into the index.
///
/// The orchestrator:
/// - Reads the snapshot and slices it into pages
/// - Transforms and dispatches pages strictly one after another
/// - Reconciles the index after development loads
/// - Reports the final document count
pub struct PipelineOrchestrator {
    metadata: RunMetadata,
    source: Arc<dyn TableSource>,
    provider: Arc<dyn SearchIndexProvider>,
    transformer: RowTransformer,
    dispatcher: ConcurrentDispatcher,
    reconciliation: ReconciliationPass,
}

impl PipelineOrchestrator {
    /// Wire the pipeline components for `metadata`.
    pub fn new(
        metadata: RunMetadata,
        source: Arc<dyn TableSource>,
        provider: Arc<dyn SearchIndexProvider>,
        sink: Arc<dyn QuarantineSink>,
    ) -> Self {
        let coordinator = RetryCoordinator::new(
            ChunkWriter::new(Arc::clone(&provider), metadata.request_timeout),
            sink,
            metadata.index_name.clone(),
            metadata.retry_limit,
            metadata.pacing,
        );

        Self {
            transformer: RowTransformer::new(&metadata),
            dispatcher: ConcurrentDispatcher::new(Arc::new(coordinator), &metadata),
            reconciliation: ReconciliationPass::new(Arc::clone(&provider), &metadata),
            metadata,
            source,
            provider,
        }
    }

    /// Run the pipeline to completion.
    ///
    /// A fatal page stops the run. Rejected documents do not; they are
    /// reported in the summary.
    #[instrument(skip(self), fields(index = %self.metadata.index_name, run_mode = %self.metadata.run_mode))]
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        info!(
            source = %self.metadata.source_location.display(),
            as_of_date = %self.metadata.as_of_date,
            process_name = %self.metadata.process_name,
            "Starting table indexer run"
        );

        let rows = self.source.scan().await?;
        let mut summary = RunSummary::default();

        for (page_index, page) in pages(rows, self.metadata.page_row_limit).enumerate() {
            let actions = self.transformer.transform_batch(page)?;
            let page_summary = self.dispatcher.dispatch(page_index, actions).await?;
            summary.absorb(&page_summary);

            info!(
                page = page_index,
                rows = page_summary.total_rows,
                succeeded = page_summary.succeeded,
                failed = page_summary.failed,
                quarantined = page_summary.quarantined_rows,
                total_succeeded = summary.succeeded,
                "Page complete"
            );

            pause(self.metadata.pacing.page_delay(page_index)).await;
        }

        summary.reconciliation = self.reconciliation.run(summary.succeeded).await?;

        summary.document_count = match self.provider.count(&self.metadata.index_name).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(error = %e, "Failed to read index document count");
                None
            }
        };

        info!(
            pages = summary.pages,
            rows = summary.total_rows,
            succeeded = summary.succeeded,
            failed = summary.failed,
            quarantined = summary.quarantined_rows,
            recovered_chunks = summary.recovered_chunks,
            document_count = ?summary.document_count,
            "Run complete"
        );
        if summary.failed > 0 {
            warn!(failed = summary.failed, "Run finished with failed documents");
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use table_indexer_repository::{SearchIndexError, WriteOutcome};
    use table_indexer_shared::{Row, RunMode};

    use crate::test_utils::{test_metadata, MemoryQuarantineSink, MockProvider};

    struct VecSource(Vec<Row>);

    #[async_trait]
    impl TableSource for VecSource {
        async fn scan(&self) -> Result<Vec<Row>, PipelineError> {
            Ok(self.0.clone())
        }
    }

    fn rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| Row::new().with("es_id", format!("doc-{}", i)).with("qty", 1))
            .collect()
    }

    fn orchestrator(
        run_mode: RunMode,
        rows: Vec<Row>,
        provider: Arc<MockProvider>,
        sink: Arc<MemoryQuarantineSink>,
    ) -> PipelineOrchestrator {
        let mut metadata = test_metadata(run_mode);
        metadata.page_row_limit = 25;
        PipelineOrchestrator::new(metadata, Arc::new(VecSource(rows)), provider, sink)
    }

    #[tokio::test]
    async fn test_run_pages_and_counts() {
        let provider = Arc::new(MockProvider::accepting());
        let summary = orchestrator(
            RunMode::Development,
            rows(60),
            provider.clone(),
            Arc::new(MemoryQuarantineSink::new()),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(summary.pages, 3);
        assert_eq!(summary.total_rows, 60);
        assert_eq!(summary.succeeded, 60);
        assert_eq!(summary.document_count, Some(60));
        assert_eq!(
            summary.reconciliation,
            Some(ReconciliationReport { stray: 0, deleted: 0 })
        );
        // Pages of 25, 25 and 10 rows make 3 + 3 + 1 chunks.
        assert_eq!(provider.bulk_calls(), 7);
    }

    #[tokio::test]
    async fn test_production_run_does_not_reconcile() {
        let provider = Arc::new(MockProvider::accepting().with_stray(5));
        let summary = orchestrator(
            RunMode::Production,
            rows(3),
            provider.clone(),
            Arc::new(MemoryQuarantineSink::new()),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(summary.reconciliation, None);
        assert!(provider.delete_queries().is_empty());
    }

    #[tokio::test]
    async fn test_missing_identity_stops_run() {
        let mut source = rows(3);
        source.push(Row::new().with("qty", 2));
        let provider = Arc::new(MockProvider::accepting());

        let result = orchestrator(
            RunMode::Development,
            source,
            provider.clone(),
            Arc::new(MemoryQuarantineSink::new()),
        )
        .run()
        .await;

        assert!(matches!(result, Err(PipelineError::TransformError(_))));
        assert_eq!(provider.bulk_calls(), 0);
    }

    #[tokio::test]
    async fn test_fatal_page_stops_later_pages() {
        let provider = Arc::new(MockProvider::with_responder(|_, actions| {
            if actions[0].document_id == "doc-0" {
                Err(SearchIndexError::bulk_index("strict_dynamic_mapping_exception"))
            } else {
                Ok(WriteOutcome::all_succeeded(actions.len()))
            }
        }));
        let sink = Arc::new(MemoryQuarantineSink::new());

        let result = orchestrator(RunMode::Development, rows(60), provider.clone(), sink.clone())
            .run()
            .await;

        match result {
            Err(PipelineError::PageAborted { page, summary, .. }) => {
                assert_eq!(page, 0);
                assert_eq!(summary.succeeded, 15);
                assert_eq!(summary.quarantined_rows, 10);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(provider.bulk_calls(), 3);
        assert_eq!(sink.quarantined_rows(), 10);
    }
}
