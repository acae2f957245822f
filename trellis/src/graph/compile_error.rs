//! Graph compilation error.
//!
//! Returned by `GraphBuilder::compile` when the graph is malformed. An
//! invalid plan never reaches execution: every fatal shape problem is
//! caught here.

use thiserror::Error;

/// Error when compiling a workflow graph.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A node id referenced by an edge was not registered (and is not
    /// START/END).
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// No edge from START.
    #[error("graph must have exactly one edge from START")]
    MissingEntry,

    /// More than one edge from START.
    #[error("graph must have exactly one edge from START (found several)")]
    MultipleEntries,

    /// No terminal: no edge or route reaches END and every node has an
    /// outgoing edge.
    #[error("graph has no terminal node")]
    MissingTerminal,

    /// A node has both a static outgoing edge and conditional edges.
    #[error("node has both edge and conditional edges: {0}")]
    NodeHasBothEdgeAndConditional(String),

    /// A node has more than one static outgoing edge.
    #[error("node has multiple outgoing edges: {0}")]
    DuplicateEdge(String),

    /// A conditional path map target is not a registered node or END.
    #[error("conditional route `{label}` targets unknown node: {target}")]
    InvalidPathMapTarget {
        /// The declared label.
        label: String,
        /// The unresolvable target.
        target: String,
    },

    /// The declared error-handling node is not registered.
    #[error("error node not found: {0}")]
    UnknownErrorNode(String),
}
