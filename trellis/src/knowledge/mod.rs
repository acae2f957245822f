//! Knowledge store: durable, importance-scored records retrievable across
//! workflow runs.
//!
//! The node execution wrapper retrieves relevant records before a node body
//! runs (exposed read-only through the node context) and stores a summary
//! record after a successful run when the node declares one. Both are
//! best-effort side effects.

mod in_memory;

pub use in_memory::InMemoryKnowledgeStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error for knowledge store operations.
///
/// Callers do not depend on underlying backend errors; the message is
/// opaque.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// Backend storage error.
    #[error("knowledge backend: {0}")]
    Backend(String),
}

/// A durable note with an importance score.
///
/// `last_accessed_at` is refreshed on every successful retrieval; that is a
/// read-through side effect, never a correctness dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    /// Unique record id.
    pub id: String,
    /// Owner the record belongs to (user, project, workflow).
    pub owner_id: String,
    /// Record type used for filtered retrieval (e.g. `"finding"`).
    pub kind: String,
    /// The note itself.
    pub content: String,
    /// Importance in `[0, 1]`; clamped on store.
    pub importance: f64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last successful retrieval timestamp.
    pub last_accessed_at: DateTime<Utc>,
    /// Free-form metadata.
    pub metadata: Value,
}

/// Retrieval request: text relevance plus filters, ranked by importance
/// then recency.
#[derive(Debug, Clone)]
pub struct KnowledgeQuery {
    /// Query text matched against record content; empty matches everything.
    pub text: String,
    /// When set, only records of this kind are returned.
    pub kind: Option<String>,
    /// Maximum number of records to return.
    pub limit: usize,
    /// Records below this importance are excluded.
    pub min_importance: f64,
}

impl KnowledgeQuery {
    /// Creates a query with the given text, no kind filter, limit 5 and no
    /// importance floor.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: None,
            limit: 5,
            min_importance: 0.0,
        }
    }

    /// Restricts results to one record kind.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Sets the maximum number of records returned.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the importance floor.
    pub fn with_min_importance(mut self, min: f64) -> Self {
        self.min_importance = min;
        self
    }
}

/// Append-only record store with filtered, ranked retrieval.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Stores a record, returning its id. Importance is clamped to `[0, 1]`.
    async fn store(
        &self,
        owner_id: &str,
        content: &str,
        kind: &str,
        importance: f64,
        metadata: Value,
    ) -> Result<String, KnowledgeError>;

    /// Retrieves records for `owner_id` matching the query, ranked by
    /// importance then recency. Refreshes `last_accessed_at` on each
    /// returned record.
    async fn retrieve(
        &self,
        owner_id: &str,
        query: &KnowledgeQuery,
    ) -> Result<Vec<KnowledgeRecord>, KnowledgeError>;
}
