//! Transformer module for the table indexer.
//!
//! Turns source rows into document actions.

mod row_transformer;

pub use row_transformer::RowTransformer;
