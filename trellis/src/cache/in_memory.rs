//! In-memory cache store.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::RwLock;

use super::{CacheError, CacheStore};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    ttl: Duration,
    created_at: Instant,
    expires_at: Instant,
    access_count: u64,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at < Instant::now()
    }
}

/// In-memory cache with sliding TTL.
///
/// Entries are created atomically per key. A successful read refreshes the
/// entry's expiry by its original TTL and increments the access count.
/// Expired entries are evicted lazily on read; call
/// [`InMemoryCache::purge_expired`] to sweep eagerly.
///
/// # Example
///
/// ```rust,ignore
/// use trellis::cache::{CacheStore, InMemoryCache};
/// use std::time::Duration;
///
/// let cache = InMemoryCache::new();
/// cache.set("node", "key", serde_json::json!(1), Duration::from_secs(60)).await?;
/// assert!(cache.get("node", "key").await.is_some());
/// ```
pub struct InMemoryCache {
    data: RwLock<HashMap<(String, String), CacheEntry>>,
}

impl InMemoryCache {
    /// Creates a new empty cache.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Removes all expired entries, returning how many were evicted.
    pub async fn purge_expired(&self) -> usize {
        let mut data = self.data.write().await;
        let before = data.len();
        data.retain(|_, entry| !entry.is_expired());
        before - data.len()
    }

    /// Number of live (possibly expired but unevicted) entries.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    /// Access count for one entry; `None` when absent.
    pub async fn access_count(&self, namespace: &str, key: &str) -> Option<u64> {
        self.data
            .read()
            .await
            .get(&(namespace.to_string(), key.to_string()))
            .map(|e| e.access_count)
    }

    /// Age of one entry since creation; `None` when absent.
    pub async fn age(&self, namespace: &str, key: &str) -> Option<Duration> {
        self.data
            .read()
            .await
            .get(&(namespace.to_string(), key.to_string()))
            .map(|e| e.created_at.elapsed())
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        let full_key = (namespace.to_string(), key.to_string());
        let mut data = self.data.write().await;
        match data.get_mut(&full_key) {
            Some(entry) if entry.is_expired() => {
                data.remove(&full_key);
                None
            }
            Some(entry) => {
                entry.access_count += 1;
                // Sliding expiry: a read extends the entry by its original TTL.
                entry.expires_at = Instant::now() + entry.ttl;
                Some(entry.value.clone())
            }
            None => None,
        }
    }

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: Value,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            ttl,
            created_at: now,
            expires_at: now + ttl,
            access_count: 0,
        };
        let mut data = self.data.write().await;
        data.insert((namespace.to_string(), key.to_string()), entry);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), CacheError> {
        let mut data = self.data.write().await;
        data.remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }
}
