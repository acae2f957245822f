//! Workflow execution error types.
//!
//! Only two classes of failure abort a run: a malformed graph
//! ([`CompileError`](crate::graph::CompileError), raised before execution
//! starts) and a routing failure ([`ExecutionError::Routing`]). Everything
//! else degrades: node failures are recorded into the state's error field
//! and the run continues, so callers always receive a terminal state.

use thiserror::Error;

/// Fatal error during graph execution; aborts `invoke` / `stream`.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The compiled graph has no nodes or the entry node is missing.
    #[error("empty graph")]
    EmptyGraph,

    /// A conditional edge produced a label (or dynamic dispatch target)
    /// that is not in its declared map. Labels may be data-dependent, so
    /// this surfaces at execution time rather than compile time.
    #[error("routing failed at node `{node}`: `{label}` is not a declared route")]
    Routing {
        /// Source node of the conditional edge.
        node: String,
        /// The undeclared label or dispatch target.
        label: String,
    },
}

/// Non-fatal failure of a single node body.
///
/// Caught by the node execution wrapper, converted into an error record in
/// the shared state, and the branch is redirected to the graph's error
/// node (when declared) or terminated.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The node body failed with a message.
    #[error("node execution failed: {0}")]
    Failed(String),

    /// The node body did not finish within the configured per-node timeout.
    #[error("node timed out after {0}ms")]
    Timeout(u64),
}

impl NodeError {
    /// Convenience constructor for a failure with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        NodeError::Failed(message.into())
    }
}
