//! Per-run configuration for graph execution.
//!
//! Passed to `CompiledGraph::invoke` / `stream`. Values are fixed for the
//! duration of a run; `max_iterations` in particular is seeded into the
//! state before the first step and never mutated mid-run.

/// Run-scoped configuration recognized by the execution engine.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Iteration ceiling for refinement loops. Seeded into the
    /// `max_iterations` state field when the schema declares it.
    pub max_iterations: u32,
    /// When false, per-node debug events are suppressed; run-level
    /// start/complete/error logs are always emitted.
    pub enable_tracing: bool,
    /// Wall-clock budget for one node invocation. A timeout is treated
    /// like any other node failure; it does not cancel sibling branches.
    pub per_node_timeout_ms: Option<u64>,
    /// Optional identifier for this run (log correlation).
    pub run_id: Option<String>,
    /// Owner id for knowledge records stored/retrieved during the run.
    pub owner_id: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            enable_tracing: true,
            per_node_timeout_ms: None,
            run_id: None,
            owner_id: None,
        }
    }
}

impl RunConfig {
    /// Creates a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the iteration ceiling.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Enables or disables per-node tracing events.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Sets the per-node timeout in milliseconds.
    pub fn with_per_node_timeout_ms(mut self, ms: u64) -> Self {
        self.per_node_timeout_ms = Some(ms);
        self
    }

    /// Sets the run id used for log correlation.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Sets the owner id for knowledge store access.
    pub fn with_owner_id(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }
}
