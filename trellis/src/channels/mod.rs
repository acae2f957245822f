//! Channels for state fields with different merge strategies.
//!
//! Each workflow state field is backed by one channel. The channel type
//! decides what happens when several writes land on the same field:
//!
//! - `LastValue`: keeps only the last written value (REPLACE reducer)
//! - `Topic`: concatenates writes into an ordered list (APPEND reducer)
//!
//! The merge strategy of a field is fixed when the state schema is defined
//! and never changes at runtime.

mod error;
mod last_value;
mod topic;

pub use error::ChannelError;
pub use last_value::LastValue;
pub use topic::Topic;

use std::fmt::Debug;

/// Channel trait for state values with different update strategies.
///
/// Channels decide how a field is updated when multiple branches write to it.
/// `LastValue` keeps the last write; `Topic` accumulates all writes in order.
pub trait Channel<T>: Send + Sync + Debug
where
    T: Clone + Send + Sync + Debug + 'static,
{
    /// Read the current value from the channel.
    ///
    /// Returns `None` if the channel has no value.
    fn read(&self) -> Option<T>;

    /// Write a new value to the channel.
    fn write(&mut self, value: T);

    /// Update the channel with multiple values.
    ///
    /// `LastValue` keeps only the last element; `Topic` extends with all.
    fn update(&mut self, updates: Vec<T>) -> Result<(), ChannelError>;

    /// Channel type name for debugging and introspection.
    fn channel_type(&self) -> &'static str;
}
