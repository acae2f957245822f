//! Channel-related errors.

use thiserror::Error;

/// Errors that can occur when updating a channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// General channel error.
    #[error("channel error: {0}")]
    Other(String),
}
