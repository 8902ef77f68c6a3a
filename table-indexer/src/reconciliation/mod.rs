//! Post-load reconciliation for development runs.
//!
//! A development run fully replaces the index contents. Any document not
//! stamped with this run's process name and as-of date is left over from an
//! earlier load and gets deleted.

use std::sync::Arc;

use serde_json::{json, Value};
use table_indexer_repository::SearchIndexProvider;
use table_indexer_shared::{RunMode, PROCESS_NAME_FIELD, UPLOAD_DATE_FIELD};
use tracing::{debug, info, instrument, warn};

use crate::config::RunMetadata;
use crate::errors::PipelineError;

/// Query matching every document not written by `process_name` for `as_of_date`.
///
/// `as_of_date` is in `yyyy-MM-dd` form.
pub fn stray_document_query(process_name: &str, as_of_date: &str) -> Value {
    json!({
        "bool": {
            "must_not": [{
                "bool": {
                    "filter": [
                        { "term": { (PROCESS_NAME_FIELD): process_name } },
                        {
                            "range": {
                                (UPLOAD_DATE_FIELD): {
                                    "gte": as_of_date,
                                    "lte": as_of_date,
                                    "format": "yyyy-MM-dd"
                                }
                            }
                        }
                    ]
                }
            }]
        }
    })
}

/// What reconciliation found and removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// Documents matching the stray query before deletion.
    pub stray: u64,
    pub deleted: u64,
}

/// Deletes documents left over from earlier development loads.
pub struct ReconciliationPass {
    provider: Arc<dyn SearchIndexProvider>,
    index: String,
    process_name: String,
    as_of_date: String,
    run_mode: RunMode,
    search_size: usize,
}

impl ReconciliationPass {
    pub fn new(provider: Arc<dyn SearchIndexProvider>, metadata: &RunMetadata) -> Self {
        Self {
            provider,
            index: metadata.index_name.clone(),
            process_name: metadata.process_name.clone(),
            as_of_date: metadata.as_of_date_dash(),
            run_mode: metadata.run_mode,
            search_size: metadata.reconcile_search_size,
        }
    }

    /// Reconcile the index after `success_total` documents were written.
    ///
    /// Returns `None` for production runs. Stray documents are deleted only
    /// when there are some and their count differs from `success_total`.
    #[instrument(skip(self), fields(index = %self.index))]
    pub async fn run(
        &self,
        success_total: usize,
    ) -> Result<Option<ReconciliationReport>, PipelineError> {
        if !self.run_mode.is_development() {
            debug!("Production run, skipping reconciliation");
            return Ok(None);
        }

        self.provider.refresh(&self.index).await?;

        let query = stray_document_query(&self.process_name, &self.as_of_date);
        let page = self
            .provider
            .search_by_query(&self.index, &query, self.search_size)
            .await?;
        let stray = page.total;

        if stray == 0 || stray == success_total as u64 {
            info!(stray, success_total, "No stray documents to delete");
            return Ok(Some(ReconciliationReport { stray, deleted: 0 }));
        }

        info!(
            stray,
            sample = page.hits.len(),
            "Deleting documents from earlier loads"
        );
        let deleted = self.provider.delete_by_query(&self.index, &query).await?;

        if deleted != stray {
            warn!(
                stray,
                deleted, "Reconciliation inconsistency: deleted count differs from stray count"
            );
        } else {
            info!(deleted, "Stray documents deleted");
        }

        Ok(Some(ReconciliationReport { stray, deleted }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::{test_metadata, MockProvider};

    #[test]
    fn test_stray_query_shape() {
        let query = stray_document_query("product_sync", "2024-03-01");
        let filter = &query["bool"]["must_not"][0]["bool"]["filter"];

        assert_eq!(filter[0]["term"]["@upload_prcs_nm"], "product_sync");
        assert_eq!(filter[1]["range"]["@upload_date"]["gte"], "2024-03-01");
        assert_eq!(filter[1]["range"]["@upload_date"]["lte"], "2024-03-01");
        assert_eq!(filter[1]["range"]["@upload_date"]["format"], "yyyy-MM-dd");
    }

    #[tokio::test]
    async fn test_stray_documents_are_deleted() {
        let provider = Arc::new(MockProvider::accepting().with_stray(7));
        let pass = ReconciliationPass::new(provider.clone(), &test_metadata(RunMode::Development));

        let report = pass.run(100).await.unwrap();

        assert_eq!(report, Some(ReconciliationReport { stray: 7, deleted: 7 }));
        assert_eq!(provider.refreshes(), 1);
        assert_eq!(
            provider.delete_queries(),
            vec![stray_document_query("test_process", "2024-03-01")]
        );
    }

    #[tokio::test]
    async fn test_nothing_stray_deletes_nothing() {
        let provider = Arc::new(MockProvider::accepting());
        let pass = ReconciliationPass::new(provider.clone(), &test_metadata(RunMode::Development));

        let report = pass.run(100).await.unwrap();

        assert_eq!(report, Some(ReconciliationReport { stray: 0, deleted: 0 }));
        assert!(provider.delete_queries().is_empty());
    }

    #[tokio::test]
    async fn test_stray_equal_to_success_total_is_left_alone() {
        let provider = Arc::new(MockProvider::accepting().with_stray(100));
        let pass = ReconciliationPass::new(provider.clone(), &test_metadata(RunMode::Development));

        let report = pass.run(100).await.unwrap();

        assert_eq!(report, Some(ReconciliationReport { stray: 100, deleted: 0 }));
        assert!(provider.delete_queries().is_empty());
    }

    #[tokio::test]
    async fn test_production_skips_reconciliation() {
        let provider = Arc::new(MockProvider::accepting().with_stray(7));
        let pass = ReconciliationPass::new(provider.clone(), &test_metadata(RunMode::Production));

        assert_eq!(pass.run(0).await.unwrap(), None);
        assert_eq!(provider.refreshes(), 0);
        assert!(provider.delete_queries().is_empty());
    }
}
