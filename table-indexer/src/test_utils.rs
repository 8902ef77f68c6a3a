//! In-memory doubles for the index client and the quarantine sink.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use table_indexer_repository::{
    FailureDetail, FailureKind, SearchIndexError, SearchIndexProvider, SearchPage, WriteOutcome,
};
use table_indexer_shared::{DocumentAction, Operation, Row, RunMode};

use crate::config::{PacingPolicy, RunMetadata};
use crate::errors::PipelineError;
use crate::quarantine::{QuarantineReceipt, QuarantineSink};

pub const TEST_INDEX: &str = "test-index";

/// `n` index actions with ids `"0"` to `"n-1"`.
pub fn actions(n: usize) -> Vec<DocumentAction> {
    (0..n)
        .map(|i| {
            DocumentAction::new(
                Operation::Index,
                i.to_string(),
                TEST_INDEX,
                Row::new().with("n", i as i64),
            )
        })
        .collect()
}

/// Metadata with no pacing delays.
pub fn test_metadata(run_mode: RunMode) -> RunMetadata {
    let mut metadata = RunMetadata::new(
        "unused",
        TEST_INDEX,
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        "test_process",
        run_mode,
    );
    metadata.chunk_row_limit = 10;
    metadata.concurrency_limit = 2;
    metadata.retry_limit = 3;
    metadata.pacing = PacingPolicy::none();
    metadata
}

/// An outcome where the first `failed` documents of `actions` failed with `kind`.
pub fn partial_failure(actions: &[DocumentAction], kind: FailureKind, failed: usize) -> WriteOutcome {
    WriteOutcome {
        success_count: actions.len() - failed,
        failed_items: actions[..failed]
            .iter()
            .map(|a| FailureDetail::new(kind, Some(a.document_id.clone())))
            .collect(),
        submitted: actions.len(),
    }
}

type Responder =
    Box<dyn Fn(usize, &[DocumentAction]) -> Result<WriteOutcome, SearchIndexError> + Send + Sync>;

/// Scriptable index client backed by an in-memory document map.
pub struct MockProvider {
    responder: Responder,
    calls: AtomicUsize,
    batches: Mutex<Vec<Vec<String>>>,
    documents: Mutex<BTreeMap<String, DocumentAction>>,
    stray_total: AtomicU64,
    refreshes: AtomicUsize,
    delete_queries: Mutex<Vec<Value>>,
}

impl MockProvider {
    /// Respond to bulk call number `call` (0-based) with `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(usize, &[DocumentAction]) -> Result<WriteOutcome, SearchIndexError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
            documents: Mutex::new(BTreeMap::new()),
            stray_total: AtomicU64::new(0),
            refreshes: AtomicUsize::new(0),
            delete_queries: Mutex::new(Vec::new()),
        }
    }

    /// Every write succeeds.
    pub fn accepting() -> Self {
        Self::with_responder(|_, actions| Ok(WriteOutcome::all_succeeded(actions.len())))
    }

    /// The first `failures` calls return `error`, later calls succeed.
    pub fn failing_first(failures: usize, error: SearchIndexError) -> Self {
        Self::with_responder(move |call, actions| {
            if call < failures {
                Err(error.clone())
            } else {
                Ok(WriteOutcome::all_succeeded(actions.len()))
            }
        })
    }

    /// Report `total` documents outside the current run on the next search.
    pub fn with_stray(self, total: u64) -> Self {
        self.stray_total.store(total, Ordering::SeqCst);
        self
    }

    pub fn bulk_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Document ids of every bulk request, in call order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn documents(&self) -> BTreeMap<String, DocumentAction> {
        self.documents.lock().unwrap().clone()
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn delete_queries(&self) -> Vec<Value> {
        self.delete_queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchIndexProvider for MockProvider {
    async fn bulk_write(
        &self,
        actions: &[DocumentAction],
        _timeout: Duration,
    ) -> Result<WriteOutcome, SearchIndexError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches
            .lock()
            .unwrap()
            .push(actions.iter().map(|a| a.document_id.clone()).collect());

        let result = (self.responder)(call, actions);
        if let Ok(outcome) = &result {
            let failed: HashSet<_> = outcome
                .failed_items
                .iter()
                .filter_map(|f| f.document_id.clone())
                .collect();
            let mut documents = self.documents.lock().unwrap();
            for action in actions.iter().filter(|a| !failed.contains(&a.document_id)) {
                documents.insert(action.document_id.clone(), action.clone());
            }
        }
        result
    }

    async fn count(&self, _index: &str) -> Result<u64, SearchIndexError> {
        Ok(self.documents.lock().unwrap().len() as u64)
    }

    async fn refresh(&self, _index: &str) -> Result<(), SearchIndexError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn search_by_query(
        &self,
        _index: &str,
        _query: &Value,
        _size: usize,
    ) -> Result<SearchPage, SearchIndexError> {
        Ok(SearchPage {
            total: self.stray_total.load(Ordering::SeqCst),
            hits: Vec::new(),
        })
    }

    async fn delete_by_query(&self, _index: &str, query: &Value) -> Result<u64, SearchIndexError> {
        self.delete_queries.lock().unwrap().push(query.clone());
        Ok(self.stray_total.swap(0, Ordering::SeqCst))
    }
}

/// Quarantine sink that keeps chunks in memory.
#[derive(Default)]
pub struct MemoryQuarantineSink {
    persisted: Mutex<Vec<(String, Vec<DocumentAction>)>>,
}

impl MemoryQuarantineSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn persisted(&self) -> Vec<(String, Vec<DocumentAction>)> {
        self.persisted.lock().unwrap().clone()
    }

    pub fn quarantined_rows(&self) -> usize {
        self.persisted
            .lock()
            .unwrap()
            .iter()
            .map(|(_, actions)| actions.len())
            .sum()
    }
}

#[async_trait]
impl QuarantineSink for MemoryQuarantineSink {
    async fn persist(
        &self,
        actions: &[DocumentAction],
        location_key: &str,
    ) -> Result<QuarantineReceipt, PipelineError> {
        self.persisted
            .lock()
            .unwrap()
            .push((location_key.to_string(), actions.to_vec()));
        Ok(QuarantineReceipt {
            location: location_key.to_string(),
            rows: actions.len(),
        })
    }
}
