//! # Table Indexer Repository
//!
//! This crate provides the index client seam used by the table indexer: the
//! `SearchIndexProvider` trait, the outcome types of a bulk write, a unified
//! error type, and a concrete implementation for OpenSearch.

pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod types;
pub mod utils;

pub use errors::SearchIndexError;
pub use interfaces::SearchIndexProvider;
pub use opensearch::OpenSearchProvider;
pub use types::{DocumentSummary, FailureDetail, FailureKind, SearchPage, WriteOutcome};
pub use utils::classify_failure;
