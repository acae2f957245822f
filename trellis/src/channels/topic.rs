//! Topic channel: accumulates values into an ordered list.
//!
//! Backs APPEND fields (search results, citations, gathered sources,
//! error records). Writes from sibling branches are concatenated in the
//! order the branches complete; nothing is dropped.

use std::fmt::Debug;

use super::{Channel, ChannelError};

/// A channel that accumulates values into a list.
///
/// # Example
///
/// ```rust
/// use trellis::channels::{Channel, Topic};
///
/// let mut topic: Topic<String> = Topic::new();
/// topic.push("first".to_string());
/// topic.push("second".to_string());
///
/// assert_eq!(topic.read(), Some(vec!["first".to_string(), "second".to_string()]));
/// ```
#[derive(Debug, Clone)]
pub struct Topic<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    values: Vec<T>,
}

impl<T> Topic<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    /// Creates a new empty Topic channel.
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Appends a single value.
    pub fn push(&mut self, value: T) {
        self.values.push(value);
    }

    /// Appends all values from an iterator.
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.values.extend(iter);
    }

    /// Returns the accumulated values as a slice.
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Returns the number of accumulated values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns whether the topic is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<T> Default for Topic<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Channel<Vec<T>> for Topic<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    /// Reads all accumulated values; `None` when the topic is empty.
    fn read(&self) -> Option<Vec<T>> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.values.clone())
        }
    }

    /// Extends the topic with the given values.
    fn write(&mut self, value: Vec<T>) {
        self.values.extend(value);
    }

    fn update(&mut self, updates: Vec<Vec<T>>) -> Result<(), ChannelError> {
        for batch in updates {
            self.values.extend(batch);
        }
        Ok(())
    }

    fn channel_type(&self) -> &'static str {
        "Topic"
    }
}
