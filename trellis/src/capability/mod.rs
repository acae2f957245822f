//! Capabilities: named external tools with validated actions.
//!
//! A capability exposes discrete actions with declared parameter contracts.
//! Capabilities are registered once at process start in a
//! [`CapabilityRegistry`]; the registry validates parameters, captures
//! wall-clock timing, and turns every failure into a failed
//! [`ActionResult`] rather than an escaping error.

mod registry;

pub use registry::{CapabilityHealth, CapabilityRegistry, CapabilityStatus};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error raised by a capability implementation's `invoke`.
///
/// Surfaced to nodes only as a failed [`ActionResult`]; never as an
/// exception-like error.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// The action exists but its execution failed.
    #[error("invocation failed: {0}")]
    Invocation(String),
}

/// Declared contract of one capability action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Action name, unique within the capability.
    pub name: String,
    /// Parameters that must be present for the action to run.
    pub required_params: Vec<String>,
    /// Parameters the action understands but does not require.
    pub optional_params: Vec<String>,
}

impl ActionSpec {
    /// Creates a spec with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_params: Vec::new(),
            optional_params: Vec::new(),
        }
    }

    /// Adds a required parameter.
    pub fn required(mut self, param: impl Into<String>) -> Self {
        self.required_params.push(param.into());
        self
    }

    /// Adds an optional parameter.
    pub fn optional(mut self, param: impl Into<String>) -> Self {
        self.optional_params.push(param.into());
        self
    }
}

/// Outcome of one `execute` call on the registry.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    /// Whether the action ran to completion.
    pub success: bool,
    /// Raw result data on success.
    pub data: Option<Value>,
    /// Descriptive error on failure.
    pub error: Option<String>,
    /// Wall-clock duration of the execute call.
    pub duration_ms: u64,
    /// Name of the capability that was addressed.
    pub capability: String,
}

impl ActionResult {
    /// Successful result with data.
    pub fn ok(capability: impl Into<String>, data: Value, duration_ms: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            duration_ms,
            capability: capability.into(),
        }
    }

    /// Failed result with a descriptive error.
    pub fn failure(capability: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            duration_ms,
            capability: capability.into(),
        }
    }
}

/// A named external tool exposing validated actions.
///
/// Identity (name, description, category, action specs) is immutable after
/// registration; runtime state (status, usage counters) lives in the
/// registry and mutates on every invocation.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Unique capability name used for lookup.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Category for grouped listing (e.g. `"search"`, `"storage"`).
    fn category(&self) -> &str;

    /// Declared actions with their parameter contracts.
    fn actions(&self) -> Vec<ActionSpec>;

    /// Executes one action. Parameters were already validated against the
    /// action's `required_params` by the registry.
    async fn invoke(
        &self,
        action: &str,
        params: &serde_json::Map<String, Value>,
    ) -> Result<Value, CapabilityError>;
}
