//! Row transformer implementation.
//!
//! Maps one source row to one document action: picks the document identity,
//! decides between full replace and upsert, strips bookkeeping columns and
//! stamps provenance fields. No I/O.

use std::cmp::max;
use std::collections::BTreeSet;

use chrono::NaiveDate;
use table_indexer_shared::{
    ColumnValue, DocumentAction, Operation, Row, RunMode, DELETED_FIELD, PROCESS_NAME_FIELD,
    UPLOAD_DATE_FIELD,
};
use tracing::{debug, instrument};

use crate::config::RunMetadata;
use crate::errors::TransformError;

/// Column carrying the soft-delete flag; `1` marks a deleted row.
const DELETE_FLAG_COLUMN: &str = "delete_f";

/// Transformer that turns source rows into document actions.
///
/// The transformer is responsible for:
/// - Lower-casing column names
/// - Extracting the document identity
/// - Choosing `Index` or `Upsert` according to the run mode
/// - Replacing bookkeeping columns with provenance fields
#[derive(Debug, Clone)]
pub struct RowTransformer {
    index: String,
    id_column: String,
    update_marker_column: String,
    bookkeeping_columns: BTreeSet<String>,
    as_of_date: NaiveDate,
    process_name: String,
    run_mode: RunMode,
}

impl RowTransformer {
    /// Create a transformer for the given run.
    pub fn new(metadata: &RunMetadata) -> Self {
        Self {
            index: metadata.index_name.clone(),
            id_column: metadata.id_column.to_lowercase(),
            update_marker_column: metadata.update_marker_column.to_lowercase(),
            bookkeeping_columns: metadata
                .bookkeeping_columns
                .iter()
                .map(|c| c.to_lowercase())
                .collect(),
            as_of_date: metadata.as_of_date,
            process_name: metadata.process_name.clone(),
            run_mode: metadata.run_mode,
        }
    }

    /// Transform a page of rows, failing on the first malformed row.
    #[instrument(skip(self, rows), fields(row_count = rows.len()))]
    pub fn transform_batch(&self, rows: Vec<Row>) -> Result<Vec<DocumentAction>, TransformError> {
        let actions = rows
            .into_iter()
            .map(|row| self.transform(row))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(action_count = actions.len(), "Transformed row batch");
        Ok(actions)
    }

    /// Transform a single row.
    ///
    /// # Errors
    ///
    /// * `TransformError::MissingIdentity` - The identity column is absent or null
    /// * `TransformError::InvalidIdentity` - The identity is not text or an integer
    /// * `TransformError::InvalidUpdateMarker` - A production row's update marker is not a date
    /// * `TransformError::DuplicateColumn` - Two column names are equal once lower-cased
    pub fn transform(&self, row: Row) -> Result<DocumentAction, TransformError> {
        let mut columns = Row::new();
        for (name, value) in row {
            let name = name.to_lowercase();
            if columns.contains(&name) {
                return Err(TransformError::DuplicateColumn(name));
            }
            columns.insert(name, value);
        }

        let identity = columns
            .remove(&self.id_column)
            .filter(|v| !v.is_null())
            .ok_or_else(|| TransformError::MissingIdentity(self.id_column.clone()))?;
        let document_id =
            identity
                .to_document_id()
                .ok_or_else(|| TransformError::InvalidIdentity {
                    column: self.id_column.clone(),
                    value: format!("{:?}", identity),
                })?;

        let deleted = columns
            .get(DELETE_FLAG_COLUMN)
            .and_then(ColumnValue::as_i64)
            == Some(1);

        let (operation, upload_date) = match self.run_mode {
            RunMode::Development => (Operation::Index, self.as_of_date),
            RunMode::Production => match columns
                .get(&self.update_marker_column)
                .filter(|v| !v.is_null())
            {
                Some(marker) => {
                    let marker_date =
                        marker
                            .as_date()
                            .ok_or_else(|| TransformError::InvalidUpdateMarker {
                                column: self.update_marker_column.clone(),
                                value: format!("{:?}", marker),
                            })?;
                    (Operation::Upsert, max(self.as_of_date, marker_date))
                }
                None => (Operation::Index, self.as_of_date),
            },
        };

        for column in &self.bookkeeping_columns {
            columns.remove(column);
        }

        columns.insert(UPLOAD_DATE_FIELD, ColumnValue::Date(upload_date));
        columns.insert(
            PROCESS_NAME_FIELD,
            ColumnValue::Text(self.process_name.clone()),
        );
        columns.insert(DELETED_FIELD, ColumnValue::Bool(deleted));

        Ok(DocumentAction::new(
            operation,
            document_id,
            self.index.clone(),
            columns,
        ))
    }
}
