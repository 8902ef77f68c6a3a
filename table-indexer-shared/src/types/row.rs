//! Source table rows.
//!
//! A row is a mapping of column name to a scalar or temporal value, read once
//! from a table snapshot and never mutated afterwards.

use std::collections::btree_map;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single cell of a source row.
///
/// Deserialization is untagged: JSON `null`, booleans and numbers map to the
/// obvious variants, strings are tried as an RFC 3339 timestamp, then as a
/// `YYYY-MM-DD` date, and fall back to text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Text(String),
}

impl ColumnValue {
    /// Whether the cell holds no value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Interpret the cell as an integer flag or number.
    ///
    /// Booleans count as `0`/`1`, whole floats and numeric text are accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Bool(v) => Some(i64::from(*v)),
            Self::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Self::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interpret the cell as a calendar date.
    ///
    /// Accepts native dates and timestamps, ISO-8601 text (`YYYY-MM-DD` or
    /// RFC 3339) and compact `YYYYMMDD` text or integers.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            Self::Timestamp(ts) => Some(ts.date_naive()),
            Self::Int(v) => NaiveDate::parse_from_str(&v.to_string(), "%Y%m%d").ok(),
            Self::Text(v) => parse_date_text(v.trim()),
            _ => None,
        }
    }

    /// Render the cell as a document identifier.
    ///
    /// Only text and integer cells make usable identifiers.
    pub fn to_document_id(&self) -> Option<String> {
        match self {
            Self::Text(v) if !v.is_empty() => Some(v.clone()),
            Self::Int(v) => Some(v.to_string()),
            _ => None,
        }
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y%m%d"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|ts| ts.with_timezone(&Utc).date_naive())
        })
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i32> for ColumnValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for ColumnValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for ColumnValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDate> for ColumnValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

/// One row of the source table, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    columns: BTreeMap<String, ColumnValue>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, convenient for constructing fixtures.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        self.columns.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.columns.get(column)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: ColumnValue) -> Option<ColumnValue> {
        self.columns.insert(column.into(), value)
    }

    pub fn remove(&mut self, column: &str) -> Option<ColumnValue> {
        self.columns.remove(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ColumnValue> {
        self.columns.iter()
    }
}

impl IntoIterator for Row {
    type Item = (String, ColumnValue);
    type IntoIter = btree_map::IntoIter<String, ColumnValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

impl FromIterator<(String, ColumnValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, ColumnValue)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_row_from_json() {
        let row: Row = serde_json::from_str(
            r#"{"es_id": "A-1", "qty": 3, "price": 9.5, "delete_f": null, "asat_dt": "2024-03-01", "active": true}"#,
        )
        .unwrap();

        assert_eq!(row.get("es_id"), Some(&ColumnValue::Text("A-1".to_string())));
        assert_eq!(row.get("qty"), Some(&ColumnValue::Int(3)));
        assert_eq!(row.get("price"), Some(&ColumnValue::Float(9.5)));
        assert_eq!(row.get("delete_f"), Some(&ColumnValue::Null));
        assert_eq!(
            row.get("asat_dt"),
            Some(&ColumnValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
        );
        assert_eq!(row.get("active"), Some(&ColumnValue::Bool(true)));
    }

    #[test]
    fn test_timestamp_text_is_parsed() {
        let row: Row = serde_json::from_str(r#"{"updt_asat_dt": "2024-03-05T10:00:00Z"}"#).unwrap();
        assert!(matches!(
            row.get("updt_asat_dt"),
            Some(ColumnValue::Timestamp(_))
        ));
        assert_eq!(
            row.get("updt_asat_dt").and_then(ColumnValue::as_date),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
    }

    #[test]
    fn test_as_date_variants() {
        let expected = NaiveDate::from_ymd_opt(2023, 12, 31);
        assert_eq!(ColumnValue::Int(20231231).as_date(), expected);
        assert_eq!(ColumnValue::from("20231231").as_date(), expected);
        assert_eq!(ColumnValue::from("2023-12-31").as_date(), expected);
        assert_eq!(ColumnValue::from("not a date").as_date(), None);
        assert_eq!(ColumnValue::Null.as_date(), None);
    }

    #[test]
    fn test_as_i64_flags() {
        assert_eq!(ColumnValue::Int(1).as_i64(), Some(1));
        assert_eq!(ColumnValue::Bool(true).as_i64(), Some(1));
        assert_eq!(ColumnValue::Float(1.0).as_i64(), Some(1));
        assert_eq!(ColumnValue::Float(1.5).as_i64(), None);
        assert_eq!(ColumnValue::from(" 1 ").as_i64(), Some(1));
        assert_eq!(ColumnValue::Null.as_i64(), None);
    }

    #[test]
    fn test_document_id_rendering() {
        assert_eq!(ColumnValue::from("abc").to_document_id(), Some("abc".to_string()));
        assert_eq!(ColumnValue::Int(42).to_document_id(), Some("42".to_string()));
        assert_eq!(ColumnValue::from("").to_document_id(), None);
        assert_eq!(ColumnValue::Float(1.0).to_document_id(), None);
    }

    #[test]
    fn test_row_serializes_dates_as_iso_text() {
        let row = Row::new().with("d", NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["d"], "2024-01-02");
    }
}
