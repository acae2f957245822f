//! In-memory knowledge store with term-overlap relevance.

use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{KnowledgeError, KnowledgeQuery, KnowledgeRecord, KnowledgeStore};

/// In-memory [`KnowledgeStore`].
///
/// Relevance is plain lowercase term overlap between the query text and the
/// record content; ranking is importance descending, then creation time
/// descending. Suitable for tests and single-process runs; persistent
/// backends implement the same trait.
pub struct InMemoryKnowledgeStore {
    records: RwLock<Vec<KnowledgeRecord>>,
}

impl InMemoryKnowledgeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Total number of records across all owners.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn matches(record: &KnowledgeRecord, owner_id: &str, query: &KnowledgeQuery) -> bool {
        if record.owner_id != owner_id {
            return false;
        }
        if let Some(kind) = &query.kind {
            if &record.kind != kind {
                return false;
            }
        }
        if record.importance < query.min_importance {
            return false;
        }
        if query.text.trim().is_empty() {
            return true;
        }
        let content = record.content.to_lowercase();
        query
            .text
            .to_lowercase()
            .split_whitespace()
            .any(|term| content.contains(term))
    }
}

impl Default for InMemoryKnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn store(
        &self,
        owner_id: &str,
        content: &str,
        kind: &str,
        importance: f64,
        metadata: Value,
    ) -> Result<String, KnowledgeError> {
        let now = Utc::now();
        let record = KnowledgeRecord {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            kind: kind.to_string(),
            content: content.to_string(),
            importance: importance.clamp(0.0, 1.0),
            created_at: now,
            last_accessed_at: now,
            metadata,
        };
        let id = record.id.clone();
        self.records.write().await.push(record);
        Ok(id)
    }

    async fn retrieve(
        &self,
        owner_id: &str,
        query: &KnowledgeQuery,
    ) -> Result<Vec<KnowledgeRecord>, KnowledgeError> {
        let mut records = self.records.write().await;
        let mut hits: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| Self::matches(r, owner_id, query))
            .map(|(i, _)| i)
            .collect();

        // Importance descending, then recency descending.
        hits.sort_by(|&a, &b| {
            records[b]
                .importance
                .partial_cmp(&records[a].importance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(records[b].created_at.cmp(&records[a].created_at))
        });
        hits.truncate(query.limit);

        let now = Utc::now();
        let mut result = Vec::with_capacity(hits.len());
        for i in hits {
            records[i].last_accessed_at = now;
            result.push(records[i].clone());
        }
        Ok(result)
    }
}
