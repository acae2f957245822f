//! Capability registry: lookup, parameter validation, safe execution.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;

use super::{ActionResult, Capability};

/// Observable execution state of one capability.
///
/// Reset to `Running` at the start of each execute call; has no bearing on
/// whether future calls are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CapabilityStatus {
    /// Registered, never or not currently executing.
    Idle,
    /// An execute call is in flight.
    Running,
    /// The last execute call succeeded.
    Succeeded,
    /// The last execute call failed.
    Failed,
}

#[derive(Debug, Clone)]
struct CapabilityRuntime {
    status: CapabilityStatus,
    invocations: u64,
    failures: u64,
    last_used: Option<DateTime<Utc>>,
}

impl CapabilityRuntime {
    fn new() -> Self {
        Self {
            status: CapabilityStatus::Idle,
            invocations: 0,
            failures: 0,
            last_used: None,
        }
    }
}

/// Health snapshot of one capability for external status queries.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityHealth {
    /// Capability name.
    pub name: String,
    /// Capability category.
    pub category: String,
    /// Current observable status.
    pub status: CapabilityStatus,
    /// Total execute calls, successful or not.
    pub invocations: u64,
    /// Execute calls that produced a failed result.
    pub failures: u64,
    /// Timestamp of the most recent execute call.
    pub last_used: Option<DateTime<Utc>>,
}

/// Registry of named capabilities.
///
/// Register everything at process start, then share the registry as
/// `Arc<CapabilityRegistry>` (explicit dependency injection; there is no
/// module-level singleton). `execute` validates parameters against the
/// action's contract and never lets an error escape as anything other than
/// a failed [`ActionResult`].
///
/// # Example
///
/// ```rust,ignore
/// let mut registry = CapabilityRegistry::new();
/// registry.register(Arc::new(WebSearch::default()));
/// let registry = Arc::new(registry);
///
/// let result = registry
///     .execute("web_search", "search", serde_json::json!({"query": "rust"}))
///     .await;
/// assert!(result.success);
/// ```
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
    runtime: DashMap<String, CapabilityRuntime>,
}

impl CapabilityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
            runtime: DashMap::new(),
        }
    }

    /// Registers a capability. Same name replaces. Registration happens at
    /// setup time, before the registry is shared.
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        let name = capability.name().to_string();
        self.runtime.insert(name.clone(), CapabilityRuntime::new());
        self.capabilities.insert(name, capability);
    }

    /// Looks up a capability by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    /// Whether a capability with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// All capabilities in the given category.
    pub fn list_by_category(&self, category: &str) -> Vec<Arc<dyn Capability>> {
        let mut caps: Vec<_> = self
            .capabilities
            .values()
            .filter(|c| c.category() == category)
            .cloned()
            .collect();
        caps.sort_by(|a, b| a.name().cmp(b.name()));
        caps
    }

    /// Registered capability names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.capabilities.keys().cloned().collect();
        names.sort();
        names
    }

    /// Validates and executes one action.
    ///
    /// Unknown capability, unknown action, non-object params or a missing
    /// required parameter yield a failed [`ActionResult`] without invoking
    /// the capability. Timing and usage counters update on every attempted
    /// invocation regardless of outcome.
    pub async fn execute(&self, name: &str, action: &str, params: Value) -> ActionResult {
        let started = Instant::now();
        let capability = match self.get(name) {
            Some(c) => c,
            None => {
                return ActionResult::failure(
                    name,
                    format!("unknown capability: {name}"),
                    elapsed_ms(started),
                );
            }
        };

        let spec = match capability.actions().into_iter().find(|a| a.name == action) {
            Some(s) => s,
            None => {
                return ActionResult::failure(
                    name,
                    format!("unknown action: {action}"),
                    elapsed_ms(started),
                );
            }
        };

        let params = match params {
            Value::Object(map) => map,
            other => {
                return ActionResult::failure(
                    name,
                    format!("params must be a JSON object, got {other}"),
                    elapsed_ms(started),
                );
            }
        };

        for required in &spec.required_params {
            if !params.contains_key(required) {
                return ActionResult::failure(
                    name,
                    format!("missing parameter: {required}"),
                    elapsed_ms(started),
                );
            }
        }

        self.mark_running(name);
        let outcome = capability.invoke(action, &params).await;
        let duration_ms = elapsed_ms(started);

        match outcome {
            Ok(data) => {
                self.mark_done(name, true);
                tracing::debug!(capability = name, action, duration_ms, "capability action ok");
                ActionResult::ok(name, data, duration_ms)
            }
            Err(e) => {
                self.mark_done(name, false);
                tracing::warn!(capability = name, action, error = %e, "capability action failed");
                ActionResult::failure(name, e.to_string(), duration_ms)
            }
        }
    }

    /// Health snapshot for every registered capability, sorted by name.
    pub fn health_status(&self) -> Vec<CapabilityHealth> {
        let mut health: Vec<_> = self
            .capabilities
            .values()
            .map(|cap| {
                let runtime = self
                    .runtime
                    .get(cap.name())
                    .map(|r| r.value().clone())
                    .unwrap_or_else(CapabilityRuntime::new);
                CapabilityHealth {
                    name: cap.name().to_string(),
                    category: cap.category().to_string(),
                    status: runtime.status,
                    invocations: runtime.invocations,
                    failures: runtime.failures,
                    last_used: runtime.last_used,
                }
            })
            .collect();
        health.sort_by(|a, b| a.name.cmp(&b.name));
        health
    }

    fn mark_running(&self, name: &str) {
        if let Some(mut runtime) = self.runtime.get_mut(name) {
            runtime.status = CapabilityStatus::Running;
            runtime.invocations += 1;
            runtime.last_used = Some(Utc::now());
        }
    }

    fn mark_done(&self, name: &str, success: bool) {
        if let Some(mut runtime) = self.runtime.get_mut(name) {
            if success {
                runtime.status = CapabilityStatus::Succeeded;
            } else {
                runtime.failures += 1;
                runtime.status = CapabilityStatus::Failed;
            }
        }
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
