//! Bounded refinement loops: research, analyze, loop or synthesize.
//!
//! The [`IterationController`] wires a loop into a graph: the analyze node
//! is wrapped so every pass increments the `iteration_count` state field
//! exactly once, and a conditional edge after it either loops back to the
//! research node or proceeds to the synthesis node. The loop exits when
//! the stop predicate is satisfied or `iteration_count` reaches the
//! ceiling seeded from `RunConfig::max_iterations`, whichever comes
//! first. The ceiling guarantees termination regardless of the predicate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::error::NodeError;
use crate::graph::{GraphBuilder, Node, NodeContext, NodeOutput, RouteOutcome};
use crate::state::{Reducer, StateSchemaBuilder, StateUpdate, WorkflowState};

/// Replace field holding the number of completed analyze passes.
pub const ITERATION_COUNT_FIELD: &str = "iteration_count";
/// Replace field holding the iteration ceiling, seeded by the engine from
/// `RunConfig::max_iterations` when unset.
pub const ITERATION_LIMIT_FIELD: &str = "max_iterations";

/// Returns `true` when the loop has gathered enough and should proceed to
/// synthesis.
pub type StopPredicate = Arc<dyn Fn(&WorkflowState) -> bool + Send + Sync>;

/// Declares the two iteration fields on a state schema.
pub fn declare_iteration_fields(builder: StateSchemaBuilder) -> StateSchemaBuilder {
    builder
        .field(ITERATION_COUNT_FIELD, Reducer::Replace)
        .field(ITERATION_LIMIT_FIELD, Reducer::Replace)
}

/// Wires a bounded research/analyze/synthesize loop into a graph.
///
/// The caller registers the research and synthesis nodes and their edges;
/// the controller contributes the wrapped analyze node and the conditional
/// edge out of it.
pub struct IterationController {
    research_id: String,
    synthesize_id: String,
    analyze: Arc<dyn Node>,
    stop: StopPredicate,
}

impl IterationController {
    /// Builds a controller looping back to `research_id` and exiting to
    /// `synthesize_id`.
    pub fn new(
        research_id: impl Into<String>,
        analyze: Arc<dyn Node>,
        synthesize_id: impl Into<String>,
        stop: StopPredicate,
    ) -> Self {
        Self {
            research_id: research_id.into(),
            synthesize_id: synthesize_id.into(),
            analyze,
            stop,
        }
    }

    /// Id of the analyze node this controller wraps.
    pub fn analyze_id(&self) -> &str {
        self.analyze.id()
    }

    /// Registers the counting analyze node and its loop-or-exit
    /// conditional edge on the builder.
    pub fn wire(self, builder: &mut GraphBuilder) {
        let analyze_id = self.analyze.id().to_string();
        let research_id = self.research_id;
        let synthesize_id = self.synthesize_id;
        let stop = self.stop;

        builder.add_node(Arc::new(CountingAnalyze { inner: self.analyze }));
        builder.add_conditional_edges(
            analyze_id,
            Arc::new(move |state: &WorkflowState| {
                let count = state.get_u64(ITERATION_COUNT_FIELD).unwrap_or(0);
                let limit = state.get_u64(ITERATION_LIMIT_FIELD).unwrap_or(0);
                if count < limit && !(stop)(state) {
                    RouteOutcome::Label("research".to_string())
                } else {
                    RouteOutcome::Label("synthesize".to_string())
                }
            }),
            HashMap::from([
                ("research".to_string(), research_id),
                ("synthesize".to_string(), synthesize_id),
            ]),
        );
    }
}

/// Wraps the analyze node so each successful pass bumps `iteration_count`
/// by exactly one. The bump is appended after the inner node's writes, so
/// it wins even if the body writes the field itself.
struct CountingAnalyze {
    inner: Arc<dyn Node>,
}

#[async_trait]
impl Node for CountingAnalyze {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn run(&self, state: &WorkflowState, ctx: &NodeContext) -> Result<NodeOutput, NodeError> {
        let mut output = self.inner.run(state, ctx).await?;
        let count = state.get_u64(ITERATION_COUNT_FIELD).unwrap_or(0);
        output.update =
            std::mem::take(&mut output.update).set(ITERATION_COUNT_FIELD, json!(count + 1));
        Ok(output)
    }

    // Memoization is disabled: the count write depends on loop state, so
    // a replayed update would be stale.

    fn knowledge_query(&self, state: &WorkflowState) -> Option<crate::knowledge::KnowledgeQuery> {
        self.inner.knowledge_query(state)
    }

    fn knowledge_summary(
        &self,
        state: &WorkflowState,
        update: &StateUpdate,
    ) -> Option<crate::graph::KnowledgeWrite> {
        self.inner.knowledge_summary(state, update)
    }

    fn required_capabilities(&self) -> Vec<String> {
        self.inner.required_capabilities()
    }
}
