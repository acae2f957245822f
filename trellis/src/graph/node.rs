//! Graph node trait: one named processing step over the workflow state.
//!
//! A node receives a read-only view of the shared state plus a
//! [`NodeContext`] (retrieved knowledge, capability handles, run config)
//! and returns a [`NodeOutput`]: the partial state to merge and whether
//! its branch continues. Nodes must not carry engine-internal side
//! effects; the returned update is their only write path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::capability::{ActionResult, CapabilityRegistry};
use crate::config::RunConfig;
use crate::error::NodeError;
use crate::knowledge::{KnowledgeQuery, KnowledgeRecord};
use crate::state::{StateUpdate, WorkflowState};

/// Whether a branch continues after this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// Follow the node's outgoing edge (or terminate if it has none).
    Continue,
    /// Terminate this branch regardless of outgoing edges.
    End,
}

/// Result of one node invocation: partial state plus routing signal.
#[derive(Debug, Clone)]
pub struct NodeOutput {
    /// The writes to merge into the shared state.
    pub update: StateUpdate,
    /// Whether the branch continues past this node.
    pub next: Next,
}

impl NodeOutput {
    /// Continue with the given update.
    pub fn update(update: StateUpdate) -> Self {
        Self {
            update,
            next: Next::Continue,
        }
    }

    /// Merge the update, then terminate this branch.
    pub fn done(update: StateUpdate) -> Self {
        Self {
            update,
            next: Next::End,
        }
    }
}

/// A knowledge record a node wants stored after a successful run.
#[derive(Debug, Clone)]
pub struct KnowledgeWrite {
    /// Record content (typically a summary of the node's result).
    pub content: String,
    /// Record kind for later filtered retrieval.
    pub kind: String,
    /// Importance score; clamped to `[0, 1]` by the store.
    pub importance: f64,
    /// Free-form metadata.
    pub metadata: Value,
}

/// Callable handles to the capabilities a node declared.
///
/// Scoped view over the shared [`CapabilityRegistry`]: calls to
/// capabilities the node did not declare fail with a failed
/// [`ActionResult`], as do calls when no registry is configured.
#[derive(Clone)]
pub struct CapabilityHandles {
    registry: Option<Arc<CapabilityRegistry>>,
    allowed: Vec<String>,
}

impl CapabilityHandles {
    pub(crate) fn new(registry: Option<Arc<CapabilityRegistry>>, allowed: Vec<String>) -> Self {
        Self { registry, allowed }
    }

    /// Handles with no registry; every call fails softly.
    pub fn none() -> Self {
        Self {
            registry: None,
            allowed: Vec::new(),
        }
    }

    /// Names of the capabilities this node declared.
    pub fn names(&self) -> &[String] {
        &self.allowed
    }

    /// Executes an action on a declared capability.
    pub async fn call(&self, name: &str, action: &str, params: Value) -> ActionResult {
        if !self.allowed.iter().any(|n| n == name) {
            return ActionResult::failure(
                name,
                format!("capability `{name}` not declared by this node"),
                0,
            );
        }
        match &self.registry {
            Some(registry) => registry.execute(name, action, params).await,
            None => ActionResult::failure(name, "no capability registry configured", 0),
        }
    }
}

/// Per-invocation context handed to the node body.
pub struct NodeContext {
    /// Knowledge records retrieved for this node, ranked by importance
    /// then recency. Read-only.
    pub knowledge: Vec<KnowledgeRecord>,
    /// Handles to the node's declared capabilities.
    pub capabilities: CapabilityHandles,
    /// The run's configuration.
    pub config: RunConfig,
    /// Index of this branch within its step, when fanned out.
    pub branch_index: usize,
}

impl NodeContext {
    /// A bare context: no knowledge, no capabilities, default config.
    /// Useful for driving nodes directly in tests.
    pub fn bare() -> Self {
        Self {
            knowledge: Vec::new(),
            capabilities: CapabilityHandles::none(),
            config: RunConfig::default(),
            branch_index: 0,
        }
    }
}

/// One step in a workflow graph: state in, partial state out.
///
/// Beyond the body itself, a node declares the cross-cutting behavior the
/// execution wrapper applies around it: an optional cache key over
/// relevant state fields, an optional knowledge query and summary, and
/// the capabilities it needs. All declarations default to "none".
#[async_trait]
pub trait Node: Send + Sync {
    /// Node id, unique within a graph.
    fn id(&self) -> &str;

    /// The node body. Must be pure with respect to engine state: all
    /// writes go through the returned update.
    async fn run(&self, state: &WorkflowState, ctx: &NodeContext) -> Result<NodeOutput, NodeError>;

    /// Deterministic cache key over the state fields this node depends
    /// on; `None` disables memoization for the node.
    fn cache_key(&self, _state: &WorkflowState) -> Option<String> {
        None
    }

    /// TTL for cached results of this node.
    fn cache_ttl(&self) -> Duration {
        Duration::from_secs(300)
    }

    /// Knowledge retrieval request derived from state; `None` skips
    /// retrieval.
    fn knowledge_query(&self, _state: &WorkflowState) -> Option<KnowledgeQuery> {
        None
    }

    /// Knowledge record to store after a successful run; `None` stores
    /// nothing.
    fn knowledge_summary(
        &self,
        _state: &WorkflowState,
        _update: &StateUpdate,
    ) -> Option<KnowledgeWrite> {
        None
    }

    /// Names of the capabilities this node calls through its context.
    fn required_capabilities(&self) -> Vec<String> {
        Vec::new()
    }
}
