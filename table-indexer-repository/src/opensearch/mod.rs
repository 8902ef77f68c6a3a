//! OpenSearch implementation of the index client.
//!
//! This module provides a concrete implementation of `SearchIndexProvider`
//! using OpenSearch as the backend.

mod bulk;
mod provider;

pub use bulk::{build_bulk_body, parse_bulk_response, parse_search_page};
pub use provider::OpenSearchProvider;
