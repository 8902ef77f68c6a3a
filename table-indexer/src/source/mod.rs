//! Source table readers.
//!
//! The pipeline only needs to materialize a table snapshot and cut it into
//! pages; the reader decides where rows come from.

mod json_lines;

use async_trait::async_trait;
use table_indexer_shared::Row;

use crate::errors::PipelineError;

pub use json_lines::JsonLinesSource;

/// A readable source table snapshot.
#[async_trait]
pub trait TableSource: Send + Sync {
    /// Read every row of the snapshot, in table order.
    async fn scan(&self) -> Result<Vec<Row>, PipelineError>;
}

/// Consuming iterator over fixed-size pages of rows.
///
/// Every page holds `page_rows` rows except possibly the last.
pub struct Pages {
    rows: std::vec::IntoIter<Row>,
    page_rows: usize,
}

impl Iterator for Pages {
    type Item = Vec<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let page: Vec<Row> = self.rows.by_ref().take(self.page_rows).collect();
        if page.is_empty() {
            None
        } else {
            Some(page)
        }
    }
}

/// Slice materialized rows into pages of at most `page_rows` rows.
pub fn pages(rows: Vec<Row>, page_rows: usize) -> Pages {
    Pages {
        rows: rows.into_iter(),
        page_rows: page_rows.max(1),
    }
}
