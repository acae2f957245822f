//! Logging utilities for graph execution.
//!
//! Structured events for run start/completion and per-node execution. Node
//! events are gated on `RunConfig::enable_tracing` by the callers; run
//! lifecycle events are always emitted.

use crate::error::ExecutionError;

/// Log run start.
pub fn log_run_start(run_id: Option<&str>) {
    tracing::info!(run_id = run_id.unwrap_or("-"), "starting workflow run");
}

/// Log run completion.
pub fn log_run_complete(run_id: Option<&str>, steps: usize) {
    tracing::info!(run_id = run_id.unwrap_or("-"), steps, "workflow run complete");
}

/// Log fatal run error.
pub fn log_run_error(run_id: Option<&str>, error: &ExecutionError) {
    tracing::error!(run_id = run_id.unwrap_or("-"), %error, "workflow run aborted");
}

/// Log node execution start.
pub fn log_node_start(node_id: &str, branch_index: usize) {
    tracing::debug!(node_id, branch_index, "starting node execution");
}

/// Log node execution completion.
pub fn log_node_complete(node_id: &str, duration_ms: u64) {
    tracing::debug!(node_id, duration_ms, "node execution complete");
}

/// Log a recorded (non-fatal) node failure.
pub fn log_node_failure(node_id: &str, message: &str) {
    tracing::warn!(node_id, message, "node failure recorded");
}
