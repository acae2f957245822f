//! Parallel fan-out: per-instance seeds, join completeness, and the
//! single-schedule join on convergence.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::json;
use trellis::{
    DynamicDispatch, ExecutionError, GraphBuilder, RouteOutcome, RunConfig, StateUpdate,
    WorkflowState, END, START,
};

use super::common::{basic_schema, CountingNode, SearchNode, StageNode};

fn fan_out_router(queries: &'static [&'static str]) -> trellis::RouterFn {
    Arc::new(move |_state: &WorkflowState| {
        RouteOutcome::FanOut(
            queries
                .iter()
                .map(|q| {
                    DynamicDispatch::new("search", StateUpdate::new().set("query", json!(q)))
                })
                .collect(),
        )
    })
}

#[tokio::test]
async fn fan_out_runs_every_instance_and_joins_once() {
    let (reflect, reflect_calls) = CountingNode::new("reflect");
    let mut builder = GraphBuilder::new(basic_schema());
    builder
        .add_node(Arc::new(StageNode::new("plan", "planned")))
        .add_node(Arc::new(SearchNode))
        .add_node(Arc::new(reflect))
        .add_edge(START, "plan")
        .add_edge("search", "reflect")
        .add_edge("reflect", END)
        .add_conditional_edges("plan", fan_out_router(&["a", "b", "c"]), HashMap::new());
    let graph = builder.compile().unwrap();

    let result = graph
        .invoke(graph.new_state(), RunConfig::default())
        .await
        .unwrap();

    // Every instance's write survives the join; order is completion order,
    // so compare as a set.
    let mut sources: Vec<String> = result
        .items("sources")
        .into_iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect();
    sources.sort();
    assert_eq!(sources, vec!["result:a", "result:b", "result:c"]);

    // Three completed instances converge on one downstream task.
    assert_eq!(reflect_calls.load(Ordering::SeqCst), 1);
    assert!(result.errors().is_empty());
}

#[tokio::test]
async fn instance_seed_is_not_shared() {
    let (reflect, _) = CountingNode::new("reflect");
    let mut builder = GraphBuilder::new(basic_schema());
    builder
        .add_node(Arc::new(StageNode::new("plan", "planned")))
        .add_node(Arc::new(SearchNode))
        .add_node(Arc::new(reflect))
        .add_edge(START, "plan")
        .add_edge("search", "reflect")
        .add_edge("reflect", END)
        .add_conditional_edges("plan", fan_out_router(&["x", "y"]), HashMap::new());
    let graph = builder.compile().unwrap();

    let result = graph
        .invoke(graph.new_state(), RunConfig::default())
        .await
        .unwrap();

    // Both instances saw their own query, so both results exist even
    // though `query` is a Replace field.
    let mut sources: Vec<String> = result
        .items("sources")
        .into_iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect();
    sources.sort();
    assert_eq!(sources, vec!["result:x", "result:y"]);

    // The shared state keeps one winner for the Replace field.
    let final_query = result.get_str("query").unwrap();
    assert!(final_query == "x" || final_query == "y");
}

#[tokio::test]
async fn dispatch_to_unknown_node_aborts() {
    let mut builder = GraphBuilder::new(basic_schema());
    builder
        .add_node(Arc::new(StageNode::new("plan", "planned")))
        .add_edge(START, "plan")
        .add_conditional_edges(
            "plan",
            Arc::new(|_state: &WorkflowState| {
                RouteOutcome::FanOut(vec![DynamicDispatch::new("ghost", StateUpdate::new())])
            }),
            HashMap::new(),
        );
    let graph = builder.compile().unwrap();

    let err = graph
        .invoke(graph.new_state(), RunConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExecutionError::Routing { node, label } if node == "plan" && label == "ghost"
    ));
}

#[tokio::test]
async fn one_failed_branch_does_not_stop_siblings() {
    // Seed one instance with a missing query so it fails inside the body.
    let router: trellis::RouterFn = Arc::new(|_state: &WorkflowState| {
        RouteOutcome::FanOut(vec![
            DynamicDispatch::new("search", StateUpdate::new().set("query", json!("good"))),
            DynamicDispatch::new("search", StateUpdate::new()),
        ])
    });
    let (reflect, reflect_calls) = CountingNode::new("reflect");
    let mut builder = GraphBuilder::new(basic_schema());
    builder
        .add_node(Arc::new(StageNode::new("plan", "planned")))
        .add_node(Arc::new(SearchNode))
        .add_node(Arc::new(reflect))
        .add_edge(START, "plan")
        .add_edge("search", "reflect")
        .add_edge("reflect", END)
        .add_conditional_edges("plan", router, HashMap::new());
    let graph = builder.compile().unwrap();

    let result = graph
        .invoke(graph.new_state(), RunConfig::default())
        .await
        .unwrap();

    assert_eq!(result.items("sources"), vec![json!("result:good")]);
    let errors = result.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].node_id, "search");
    // The surviving branch still reaches the join.
    assert_eq!(reflect_calls.load(Ordering::SeqCst), 1);
}

/// Each instance appends exactly one item after a seed-dependent delay;
/// the merged field must hold every item exactly once regardless of the
/// interleaving.
struct JitteredAppend;

#[async_trait::async_trait]
impl trellis::Node for JitteredAppend {
    fn id(&self) -> &str {
        "jitter"
    }

    async fn run(
        &self,
        state: &WorkflowState,
        _ctx: &trellis::NodeContext,
    ) -> Result<trellis::NodeOutput, trellis::NodeError> {
        let item = state
            .get_str("query")
            .ok_or_else(|| trellis::NodeError::failed("no seed"))?;
        let delay = item.bytes().map(u64::from).sum::<u64>() % 7;
        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        Ok(trellis::NodeOutput::update(
            StateUpdate::new().set("sources", json!([item])),
        ))
    }
}

#[tokio::test]
async fn append_merge_drops_nothing_under_interleaving() {
    let router: trellis::RouterFn = Arc::new(|_state: &WorkflowState| {
        RouteOutcome::FanOut(
            (0..20)
                .map(|i| {
                    DynamicDispatch::new(
                        "jitter",
                        StateUpdate::new().set("query", json!(format!("item-{i:02}"))),
                    )
                })
                .collect(),
        )
    });
    let mut builder = GraphBuilder::new(basic_schema());
    builder
        .add_node(Arc::new(StageNode::new("plan", "planned")))
        .add_node(Arc::new(JitteredAppend))
        .add_edge(START, "plan")
        .add_edge("jitter", END)
        .add_conditional_edges("plan", router, HashMap::new());
    let graph = builder.compile().unwrap();

    let result = graph
        .invoke(graph.new_state(), RunConfig::default())
        .await
        .unwrap();

    let mut sources: Vec<String> = result
        .items("sources")
        .into_iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect();
    assert_eq!(sources.len(), 20);
    sources.sort();
    sources.dedup();
    let expected: Vec<String> = (0..20).map(|i| format!("item-{i:02}")).collect();
    assert_eq!(sources, expected);
}

#[tokio::test]
async fn empty_fan_out_ends_the_run() {
    let mut builder = GraphBuilder::new(basic_schema());
    builder
        .add_node(Arc::new(StageNode::new("plan", "planned")))
        .add_edge(START, "plan")
        .add_conditional_edges(
            "plan",
            Arc::new(|_state: &WorkflowState| RouteOutcome::FanOut(Vec::new())),
            HashMap::new(),
        );
    let graph = builder.compile().unwrap();

    let result = graph
        .invoke(graph.new_state(), RunConfig::default())
        .await
        .unwrap();
    assert_eq!(result.get_str("stage").as_deref(), Some("planned"));
}
