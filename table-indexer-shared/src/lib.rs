//! # Table Indexer Shared
//!
//! This crate defines the data structures shared across the table indexer:
//! source rows, the document actions derived from them, and the run mode
//! that selects how rows are mapped.

pub mod types;

pub use types::document_action::{
    DocumentAction, Operation, DELETED_FIELD, PROCESS_NAME_FIELD, UPLOAD_DATE_FIELD,
};
pub use types::row::{ColumnValue, Row};
pub use types::run_mode::RunMode;
