//! Error types for the table indexer repository.
//!
//! This module provides a unified error type for all index client operations.

mod search_index_error;

pub use search_index_error::SearchIndexError;
