//! Streaming events for graph runs.
//!
//! `CompiledGraph::stream` emits these through a channel-backed stream.
//! The sequence is finite and not restartable; re-running requires a new
//! `invoke` or `stream` call.

use std::collections::HashSet;

use crate::state::{StateUpdate, WorkflowState};

/// Which event families a `stream` call should emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamMode {
    /// Full state snapshot after each merge.
    Values,
    /// Per-node state deltas as they merge.
    Updates,
    /// Node lifecycle events (start/end).
    Tasks,
    /// Everything.
    Debug,
}

impl From<StreamMode> for HashSet<StreamMode> {
    fn from(mode: StreamMode) -> Self {
        [mode].into_iter().collect()
    }
}

/// One event emitted during a streamed graph run.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A node instance started executing.
    TaskStart {
        /// Node id.
        node_id: String,
        /// Index of the branch within its superstep.
        branch_index: usize,
    },
    /// A node instance finished (with the recorded error message on failure).
    TaskEnd {
        /// Node id.
        node_id: String,
        /// Ok on success, the failure message otherwise.
        result: Result<(), String>,
    },
    /// The state delta a node contributed, in merge order.
    Updates {
        /// Node id the delta came from.
        node_id: String,
        /// The merged delta.
        update: StateUpdate,
    },
    /// Full state snapshot after a merge.
    Values(WorkflowState),
    /// The run aborted with a fatal error (routing failure).
    RunError(String),
}
