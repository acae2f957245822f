//! Cache-related errors.

use thiserror::Error;

/// Errors that can occur when working with a cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backend storage error. Message is opaque to avoid leaking backend types.
    #[error("cache backend: {0}")]
    Backend(String),
}
