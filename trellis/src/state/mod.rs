//! Workflow state: a schema of named fields with explicit merge policies.
//!
//! The state is the only resource shared between branches. Every field is
//! declared up front in a [`StateSchema`] together with its [`Reducer`];
//! unknown fields are rejected at construction and at update time. Nodes
//! never mutate the shared state directly: they return a [`StateUpdate`]
//! that the engine merges through each field's channel.
//!
//! # Example
//!
//! ```rust
//! use trellis::state::{Reducer, StateSchema, StateUpdate, WorkflowState};
//! use serde_json::json;
//!
//! let schema = StateSchema::builder()
//!     .field("stage", Reducer::Replace)
//!     .field("sources_gathered", Reducer::Append)
//!     .build();
//!
//! let mut state = WorkflowState::new(schema.into());
//! let update = StateUpdate::new()
//!     .set("stage", json!("research"))
//!     .set("sources_gathered", json!(["https://example.com"]));
//! state.apply(&update).unwrap();
//!
//! assert_eq!(state.get("stage"), Some(json!("research")));
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::channels::{Channel, LastValue, Topic};

/// Merge policy for one state field, fixed at schema-definition time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reducer {
    /// Last writer wins. For fields written by more than one concurrent
    /// branch the winner is the branch that completes last; callers must
    /// not rely on which one that is.
    Replace,
    /// Writes are concatenated into an ordered sequence in branch
    /// completion order. No write is ever dropped.
    Append,
}

/// Error when constructing or updating workflow state.
#[derive(Debug, Error)]
pub enum StateError {
    /// A field name is not declared in the state schema.
    #[error("unknown state field: {0}")]
    UnknownField(String),
}

/// Declaration of the workflow state fields and their reducers.
///
/// Built once per graph via [`StateSchema::builder`]; shared by every
/// [`WorkflowState`] produced for that graph. Always contains the
/// error-accumulation field (an `Append` field, `"errors"` by default)
/// where per-node failures are recorded.
#[derive(Debug, Clone)]
pub struct StateSchema {
    fields: BTreeMap<String, Reducer>,
    error_field: String,
}

impl StateSchema {
    /// Starts a schema builder with the default error field (`"errors"`).
    pub fn builder() -> StateSchemaBuilder {
        StateSchemaBuilder {
            fields: BTreeMap::new(),
            error_field: "errors".to_string(),
        }
    }

    /// Returns the reducer declared for `field`, or `None` if undeclared.
    pub fn reducer(&self, field: &str) -> Option<Reducer> {
        self.fields.get(field).copied()
    }

    /// Returns the name of the error-accumulation field.
    pub fn error_field(&self) -> &str {
        &self.error_field
    }

    /// Iterates over declared fields and their reducers.
    pub fn fields(&self) -> impl Iterator<Item = (&str, Reducer)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Builder for [`StateSchema`].
pub struct StateSchemaBuilder {
    fields: BTreeMap<String, Reducer>,
    error_field: String,
}

impl StateSchemaBuilder {
    /// Declares a field with the given reducer. Redeclaring replaces.
    pub fn field(mut self, name: impl Into<String>, reducer: Reducer) -> Self {
        self.fields.insert(name.into(), reducer);
        self
    }

    /// Renames the error-accumulation field (default `"errors"`).
    /// The field is always declared with the `Append` reducer.
    pub fn error_field(mut self, name: impl Into<String>) -> Self {
        self.error_field = name.into();
        self
    }

    /// Finalizes the schema. The error field is declared as `Append`.
    pub fn build(mut self) -> StateSchema {
        self.fields.insert(self.error_field.clone(), Reducer::Append);
        StateSchema {
            fields: self.fields,
            error_field: self.error_field,
        }
    }
}

/// A per-node failure recorded into the state's error field.
///
/// Presence of error records marks the final state as degraded; callers
/// inspect them instead of receiving a crash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Id of the node whose execution failed.
    pub node_id: String,
    /// Human-readable failure message.
    pub message: String,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    /// Creates an error record stamped with the current time.
    pub fn new(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Ordered set of field writes returned by a node.
///
/// Serializable so the node execution wrapper can memoize it. For an
/// `Append` field, an array value appends all its elements; any other
/// value appends a single item. For a `Replace` field the value replaces
/// the current one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    entries: Vec<(String, Value)>,
}

impl StateUpdate {
    /// Creates an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field write. Order of writes is preserved.
    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.entries.push((field.into(), value));
        self
    }

    /// Returns whether the update has no writes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the writes in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// The shared, typed workflow state: one channel per schema field.
///
/// `Replace` fields are backed by [`LastValue`], `Append` fields by
/// [`Topic`]. All mutation goes through [`WorkflowState::apply`]; branches
/// never see each other's writes before the engine's merge point.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    schema: Arc<StateSchema>,
    replace: BTreeMap<String, LastValue<Value>>,
    append: BTreeMap<String, Topic<Value>>,
}

impl WorkflowState {
    /// Creates an empty state for the given schema.
    pub fn new(schema: Arc<StateSchema>) -> Self {
        let mut replace = BTreeMap::new();
        let mut append = BTreeMap::new();
        for (name, reducer) in schema.fields() {
            match reducer {
                Reducer::Replace => {
                    replace.insert(name.to_string(), LastValue::new());
                }
                Reducer::Append => {
                    append.insert(name.to_string(), Topic::new());
                }
            }
        }
        Self {
            schema,
            replace,
            append,
        }
    }

    /// Creates a state seeded with initial values.
    ///
    /// Returns `StateError::UnknownField` if any seed names an undeclared
    /// field.
    pub fn with_values(
        schema: Arc<StateSchema>,
        values: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<Self, StateError> {
        let mut state = Self::new(schema);
        let mut update = StateUpdate::new();
        for (field, value) in values {
            update = update.set(field, value);
        }
        state.apply(&update)?;
        Ok(state)
    }

    /// Returns the schema this state was built from.
    pub fn schema(&self) -> &Arc<StateSchema> {
        &self.schema
    }

    /// Reads a field value.
    ///
    /// For an `Append` field the accumulated items are returned as a JSON
    /// array; `None` when the field is empty or never written.
    pub fn get(&self, field: &str) -> Option<Value> {
        if let Some(channel) = self.replace.get(field) {
            return channel.read();
        }
        self.append
            .get(field)
            .and_then(|topic| topic.read())
            .map(Value::Array)
    }

    /// Reads the items of an `Append` field (empty when unset).
    pub fn items(&self, field: &str) -> Vec<Value> {
        self.append
            .get(field)
            .map(|topic| topic.values().to_vec())
            .unwrap_or_default()
    }

    /// Reads a field as a string, if set and a string.
    pub fn get_str(&self, field: &str) -> Option<String> {
        self.get(field)
            .and_then(|v| v.as_str().map(|s| s.to_string()))
    }

    /// Reads a field as a u64, if set and numeric.
    pub fn get_u64(&self, field: &str) -> Option<u64> {
        self.get(field).and_then(|v| v.as_u64())
    }

    /// Merges an update into the state through each field's channel.
    ///
    /// Writes are applied in the update's order. An undeclared field fails
    /// the whole apply with `StateError::UnknownField` without partially
    /// committing later writes (earlier writes remain applied; callers
    /// treat an apply failure as a node failure).
    pub fn apply(&mut self, update: &StateUpdate) -> Result<(), StateError> {
        for (field, value) in update.iter() {
            match self.schema.reducer(field) {
                Some(Reducer::Replace) => {
                    if let Some(channel) = self.replace.get_mut(field) {
                        channel.write(value.clone());
                    }
                }
                Some(Reducer::Append) => {
                    if let Some(topic) = self.append.get_mut(field) {
                        match value {
                            Value::Array(items) => topic.extend(items.iter().cloned()),
                            other => topic.push(other.clone()),
                        }
                    }
                }
                None => return Err(StateError::UnknownField(field.to_string())),
            }
        }
        Ok(())
    }

    /// Appends an error record to the error-accumulation field.
    pub fn push_error(&mut self, record: ErrorRecord) {
        let field = self.schema.error_field().to_string();
        if let Some(topic) = self.append.get_mut(&field) {
            topic.push(serde_json::json!({
                "node_id": record.node_id,
                "message": record.message,
                "timestamp": record.timestamp.to_rfc3339(),
            }));
        }
    }

    /// Returns the recorded error records, skipping malformed entries.
    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.items(self.schema.error_field())
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect()
    }
}
