//! Cache store for memoizing node results and other expensive work.
//!
//! Namespaced key/value storage with per-entry TTL. The node execution
//! wrapper uses it cache-aside: check before invoking a node body, write
//! after a successful invocation. Cache failures are best-effort side
//! effects and never fail a node's primary result.

mod error;
mod in_memory;

pub use error::CacheError;
pub use in_memory::InMemoryCache;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Namespaced key/value cache with TTL.
///
/// Writes are atomic per key. Implementations are externally synchronized
/// shared services; the engine relies on nothing stronger than
/// read-your-writes per key. When two sibling branches compute the same
/// key concurrently, the last writer wins and later readers see that
/// value (known stampede window, deliberately not resolved here).
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Gets a value by namespace and key.
    ///
    /// Returns `None` when absent or expired. A successful read refreshes
    /// the entry's TTL and bumps its access count.
    async fn get(&self, namespace: &str, key: &str) -> Option<Value>;

    /// Stores a value with the given TTL, replacing any existing entry.
    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: Value,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Removes an entry if present.
    async fn delete(&self, namespace: &str, key: &str) -> Result<(), CacheError>;
}
