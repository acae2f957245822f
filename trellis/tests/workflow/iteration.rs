//! Bounded refinement loop: route, generate queries, fan out searches,
//! reflect, then loop or synthesize.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use trellis::{
    declare_iteration_fields, DynamicDispatch, GraphBuilder, IterationController, Node,
    NodeContext, NodeError, NodeOutput, Reducer, RouteOutcome, RunConfig, StateSchema, StateUpdate,
    StopPredicate, WorkflowState, END, START, ITERATION_COUNT_FIELD,
};

use super::common::{SearchNode, StageNode};

fn loop_schema() -> StateSchema {
    declare_iteration_fields(
        StateSchema::builder()
            .field("stage", Reducer::Replace)
            .field("sources", Reducer::Append)
            .field("query", Reducer::Replace),
    )
    .build()
}

struct Reflect;

#[async_trait]
impl Node for Reflect {
    fn id(&self) -> &str {
        "reflect"
    }

    async fn run(
        &self,
        _state: &WorkflowState,
        _ctx: &NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        Ok(NodeOutput::update(
            StateUpdate::new().set("stage", json!("reflected")),
        ))
    }
}

/// Two fresh queries per pass, derived from the current iteration count.
fn generate_router() -> trellis::RouterFn {
    Arc::new(|state: &WorkflowState| {
        let pass = state.get_u64(ITERATION_COUNT_FIELD).unwrap_or(0);
        RouteOutcome::FanOut(
            ["a", "b"]
                .iter()
                .map(|suffix| {
                    DynamicDispatch::new(
                        "search",
                        StateUpdate::new().set("query", json!(format!("q{pass}-{suffix}"))),
                    )
                })
                .collect(),
        )
    })
}

fn loop_graph(stop: StopPredicate) -> trellis::CompiledGraph {
    let mut builder = GraphBuilder::new(loop_schema());
    builder
        .add_node(Arc::new(StageNode::new("route", "routed")))
        .add_node(Arc::new(StageNode::new("generate", "generating")))
        .add_node(Arc::new(SearchNode))
        .add_node(Arc::new(StageNode::new("synthesize", "done")))
        .add_edge(START, "route")
        .add_edge("route", "generate")
        .add_edge("search", "reflect")
        .add_edge("synthesize", END);
    builder.add_conditional_edges(
        "generate",
        generate_router(),
        std::collections::HashMap::new(),
    );
    IterationController::new("generate", Arc::new(Reflect), "synthesize", stop)
        .wire(&mut builder);
    builder.compile().unwrap()
}

#[tokio::test]
async fn loop_is_bounded_by_max_iterations() {
    let graph = loop_graph(Arc::new(|_state| false));

    let config = RunConfig::default().with_max_iterations(2);
    let result = graph.invoke(graph.new_state(), config).await.unwrap();

    assert_eq!(result.get_u64(ITERATION_COUNT_FIELD), Some(2));
    assert_eq!(result.get_str("stage").as_deref(), Some("done"));

    // Two passes of two searches each, all gathered.
    let mut sources: Vec<String> = result
        .items("sources")
        .into_iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect();
    sources.sort();
    assert_eq!(
        sources,
        vec!["result:q0-a", "result:q0-b", "result:q1-a", "result:q1-b"]
    );
    assert!(result.errors().is_empty());
}

#[tokio::test]
async fn satisfied_predicate_exits_before_ceiling() {
    // Enough once any sources were gathered.
    let graph = loop_graph(Arc::new(|state| !state.items("sources").is_empty()));

    let config = RunConfig::default().with_max_iterations(5);
    let result = graph.invoke(graph.new_state(), config).await.unwrap();

    assert_eq!(result.get_u64(ITERATION_COUNT_FIELD), Some(1));
    assert_eq!(result.items("sources").len(), 2);
    assert_eq!(result.get_str("stage").as_deref(), Some("done"));
}

#[tokio::test]
async fn seeded_ceiling_wins_over_config() {
    let graph = loop_graph(Arc::new(|_state| false));

    let state = graph
        .initial_state([("max_iterations".to_string(), json!(1))])
        .unwrap();
    let config = RunConfig::default().with_max_iterations(5);
    let result = graph.invoke(state, config).await.unwrap();

    assert_eq!(result.get_u64(ITERATION_COUNT_FIELD), Some(1));
    assert_eq!(result.items("sources").len(), 2);
}
