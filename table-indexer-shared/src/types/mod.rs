//! Core data structures used across the table indexer.

pub mod document_action;
pub mod row;
pub mod run_mode;
