//! Document Store
//!
//! The capability the trademark core needs from a search engine: collection
//! lifecycle, structured search, a max aggregation, versioned partial updates
//! and bulk writes.
//!
//! Two backends implement [`DocumentStore`]:
//!
//! - [`ElasticsearchStore`] talks to an Elasticsearch cluster over HTTP.
//! - [`MemoryStore`] evaluates the same query DSL in-process.

pub mod elasticsearch;
pub mod error;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub use elasticsearch::ElasticsearchStore;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;

/// A stored JSON document.
pub type Document = Map<String, Value>;

// ============================================================================
// Request / Response Types
// ============================================================================

/// A structured search in the engine's query DSL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: Value,
    #[serde(default)]
    pub sort: Vec<Value>,
    #[serde(default)]
    pub from: usize,
    pub size: usize,
    /// Restrict returned `_source` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<Value>,
}

impl SearchRequest {
    /// Render the `_search` request body.
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "query": self.query,
            "sort": self.sort,
            "from": self.from,
            "size": self.size,
            "track_total_hits": true,
            "seq_no_primary_term": true,
        });
        if let Some(source) = &self.source {
            body["_source"] = json!(source);
        }
        if let Some(highlight) = &self.highlight {
            body["highlight"] = highlight.clone();
        }
        body
    }
}

/// Optimistic concurrency token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocVersion {
    pub seq_no: u64,
    pub primary_term: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub source: Document,
    pub score: Option<f64>,
    pub version: Option<DocVersion>,
    pub highlight: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub total: u64,
}

/// Result of a conditional partial update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated { version: DocVersion },
    /// Partial document changed nothing.
    Noop { version: DocVersion },
    /// Expected version no longer current.
    Conflict,
    NotFound,
}

impl UpdateOutcome {
    /// True when the document now holds the partial values.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Updated { .. } | Self::Noop { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub success: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreInfo {
    pub engine: String,
    pub version: String,
}

// ============================================================================
// Store Capability
// ============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Whether the collection exists.
    async fn exists(&self, collection: &str) -> StoreResult<bool>;

    /// Create a collection from an index definition (settings + mappings).
    async fn create_collection(&self, collection: &str, definition: &Value) -> StoreResult<()>;

    async fn delete_collection(&self, collection: &str) -> StoreResult<()>;

    async fn count(&self, collection: &str) -> StoreResult<u64>;

    async fn search(&self, collection: &str, request: &SearchRequest)
        -> StoreResult<SearchResponse>;

    /// Maximum of a field across the collection, `None` when no document
    /// carries a usable value.
    async fn max_value(&self, collection: &str, field: &str) -> StoreResult<Option<Value>>;

    /// Merge `partial` into document `id`. With `expected` set the write only
    /// applies if the document is still at that version.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        partial: Document,
        expected: Option<DocVersion>,
    ) -> StoreResult<UpdateOutcome>;

    /// Index documents, using each document's `pid` as its id.
    async fn bulk_index(&self, collection: &str, documents: Vec<Document>)
        -> StoreResult<BulkOutcome>;

    /// Remove every document, keeping the collection. Returns the number
    /// removed.
    async fn delete_all(&self, collection: &str) -> StoreResult<u64>;

    async fn info(&self) -> StoreResult<StoreInfo>;
}

/// Id a document is stored under.
pub(crate) fn document_id(document: &Document) -> Option<String> {
    match document.get("pid") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
