//! Bulk request construction and response parsing.
//!
//! Kept free of I/O so the wire mapping can be tested without a cluster.

use serde_json::{json, Value};
use table_indexer_shared::{DocumentAction, Operation};

use crate::errors::SearchIndexError;
use crate::types::{DocumentSummary, FailureDetail, SearchPage, WriteOutcome};
use crate::utils::classify_failure;

/// Build the newline-delimited bulk body for a sequence of actions.
///
/// Every action produces two lines: the action header and the source.
/// `Index` actions send the payload as the full document; `Upsert` actions
/// wrap it as a partial update with `doc_as_upsert`.
///
/// # Returns
///
/// * `Ok(Vec<Value>)` - Header and source lines in order
/// * `Err(SearchIndexError)` - If a payload cannot be serialized
pub fn build_bulk_body(actions: &[DocumentAction]) -> Result<Vec<Value>, SearchIndexError> {
    let mut lines = Vec::with_capacity(actions.len() * 2);

    for action in actions {
        let source = serde_json::to_value(&action.payload).map_err(|e| {
            SearchIndexError::serialization(format!(
                "Failed to serialize document {}: {}",
                action.document_id, e
            ))
        })?;
        let meta = json!({ "_index": action.index, "_id": action.document_id });

        match action.operation {
            Operation::Index => {
                lines.push(json!({ "index": meta }));
                lines.push(source);
            }
            Operation::Upsert => {
                lines.push(json!({ "update": meta }));
                lines.push(json!({ "doc": source, "doc_as_upsert": true }));
            }
        }
    }

    Ok(lines)
}

/// Parse a bulk response body into a `WriteOutcome`.
///
/// Each entry in `items` is an object keyed by the operation name
/// (`index`, `update`, ...). An item succeeded when its status is 2xx.
pub fn parse_bulk_response(body: &Value, submitted: usize) -> Result<WriteOutcome, SearchIndexError> {
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchIndexError::parse("Bulk response has no items array"))?;

    let mut outcome = WriteOutcome {
        success_count: 0,
        failed_items: Vec::new(),
        submitted,
    };

    for item in items {
        let result = item
            .as_object()
            .and_then(|obj| obj.values().next())
            .ok_or_else(|| SearchIndexError::parse(format!("Malformed bulk item: {}", item)))?;

        let status = result
            .get("status")
            .and_then(Value::as_u64)
            .map(|s| s as u16);

        if matches!(status, Some(200..=299)) {
            outcome.success_count += 1;
            continue;
        }

        let error = result.get("error");
        let error_type = error.and_then(|e| e.get("type")).and_then(Value::as_str);
        let reason = error
            .and_then(|e| e.get("reason"))
            .and_then(Value::as_str);

        outcome.failed_items.push(FailureDetail {
            kind: classify_failure(status, error_type),
            document_id: result
                .get("_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            status,
            reason: match (error_type, reason) {
                (Some(t), Some(r)) => Some(format!("{}: {}", t, r)),
                (Some(t), None) => Some(t.to_string()),
                (None, Some(r)) => Some(r.to_string()),
                (None, None) => None,
            },
        });
    }

    Ok(outcome)
}

/// Parse a search response body into a `SearchPage`.
///
/// Accepts both `hits.total` shapes: the object form (`{"value": n}`) and
/// the bare number used by older clusters.
pub fn parse_search_page(body: &Value) -> Result<SearchPage, SearchIndexError> {
    let hits = body
        .get("hits")
        .ok_or_else(|| SearchIndexError::parse("Search response has no hits"))?;

    let docs = hits
        .get("hits")
        .and_then(Value::as_array)
        .map(|docs| {
            docs.iter()
                .map(|doc| DocumentSummary {
                    id: doc
                        .get("_id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    index: doc
                        .get("_index")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    source: doc.get("_source").cloned().unwrap_or(Value::Null),
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let total = match hits.get("total") {
        Some(Value::Object(total)) => total.get("value").and_then(Value::as_u64),
        Some(Value::Number(n)) => n.as_u64(),
        _ => None,
    }
    .unwrap_or(docs.len() as u64);

    Ok(SearchPage { total, hits: docs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FailureKind;
    use table_indexer_shared::Row;

    fn action(op: Operation, id: &str) -> DocumentAction {
        DocumentAction::new(op, id, "products", Row::new().with("name", "Lamp"))
    }

    #[test]
    fn test_build_index_lines() {
        let lines = build_bulk_body(&[action(Operation::Index, "1")]).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], json!({"index": {"_index": "products", "_id": "1"}}));
        assert_eq!(lines[1], json!({"name": "Lamp"}));
    }

    #[test]
    fn test_build_upsert_lines() {
        let lines = build_bulk_body(&[action(Operation::Upsert, "7")]).unwrap();
        assert_eq!(lines[0], json!({"update": {"_index": "products", "_id": "7"}}));
        assert_eq!(
            lines[1],
            json!({"doc": {"name": "Lamp"}, "doc_as_upsert": true})
        );
    }

    #[test]
    fn test_build_preserves_action_order() {
        let lines = build_bulk_body(&[
            action(Operation::Index, "a"),
            action(Operation::Upsert, "b"),
        ])
        .unwrap();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["index"]["_id"], "a");
        assert_eq!(lines[2]["update"]["_id"], "b");
    }

    #[test]
    fn test_parse_all_successful() {
        let body = json!({
            "took": 3,
            "errors": false,
            "items": [
                {"index": {"_id": "1", "status": 201}},
                {"update": {"_id": "2", "status": 200}}
            ]
        });
        let outcome = parse_bulk_response(&body, 2).unwrap();
        assert_eq!(outcome, WriteOutcome::all_succeeded(2));
    }

    #[test]
    fn test_parse_partial_failures() {
        let body = json!({
            "errors": true,
            "items": [
                {"index": {"_id": "1", "status": 201}},
                {"index": {"_id": "2", "status": 429,
                    "error": {"type": "es_rejected_execution_exception", "reason": "queue full"}}},
                {"index": {"_id": "3", "status": 400,
                    "error": {"type": "mapper_parsing_exception", "reason": "bad date"}}}
            ]
        });
        let outcome = parse_bulk_response(&body, 3).unwrap();
        assert_eq!(outcome.success_count, 1);
        assert_eq!(outcome.failed_items.len(), 2);
        assert_eq!(outcome.failed_items[0].kind, FailureKind::RateLimited);
        assert_eq!(outcome.failed_items[0].document_id.as_deref(), Some("2"));
        assert_eq!(
            outcome.failed_items[0].reason.as_deref(),
            Some("es_rejected_execution_exception: queue full")
        );
        assert_eq!(outcome.failed_items[1].kind, FailureKind::DocumentRejected);
        assert_eq!(outcome.failed_items[1].status, Some(400));
    }

    #[test]
    fn test_parse_missing_items_is_error() {
        let result = parse_bulk_response(&json!({"errors": false}), 1);
        assert!(matches!(result, Err(SearchIndexError::ParseError(_))));
    }

    #[test]
    fn test_parse_search_page_object_total() {
        let body = json!({
            "hits": {
                "total": {"value": 1500, "relation": "eq"},
                "hits": [
                    {"_index": "products", "_id": "x", "_source": {"@upload_prcs_nm": "old"}}
                ]
            }
        });
        let page = parse_search_page(&body).unwrap();
        assert_eq!(page.total, 1500);
        assert_eq!(page.hits.len(), 1);
        assert_eq!(page.hits[0].id, "x");
        assert_eq!(page.hits[0].source["@upload_prcs_nm"], "old");
    }

    #[test]
    fn test_parse_search_page_numeric_total() {
        let body = json!({"hits": {"total": 4, "hits": []}});
        assert_eq!(parse_search_page(&body).unwrap().total, 4);
    }
}
