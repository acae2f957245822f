//! Compile validation: every malformed shape fails before execution.

use std::collections::HashMap;
use std::sync::Arc;

use trellis::{CompileError, GraphBuilder, RouteOutcome, WorkflowState, END, START};

use super::common::{basic_schema, StageNode};

fn label_router(label: &'static str) -> trellis::RouterFn {
    Arc::new(move |_state: &WorkflowState| RouteOutcome::Label(label.to_string()))
}

#[test]
fn edge_to_unknown_node_fails() {
    let mut builder = GraphBuilder::new(basic_schema());
    builder
        .add_node(Arc::new(StageNode::new("a", "a")))
        .add_edge(START, "a")
        .add_edge("a", "ghost");
    let err = builder.compile().unwrap_err();
    assert!(matches!(err, CompileError::NodeNotFound(id) if id == "ghost"));
}

#[test]
fn edge_from_unknown_node_fails() {
    let mut builder = GraphBuilder::new(basic_schema());
    builder
        .add_node(Arc::new(StageNode::new("a", "a")))
        .add_edge(START, "a")
        .add_edge("ghost", END);
    let err = builder.compile().unwrap_err();
    assert!(matches!(err, CompileError::NodeNotFound(id) if id == "ghost"));
}

#[test]
fn missing_entry_fails() {
    let mut builder = GraphBuilder::new(basic_schema());
    builder
        .add_node(Arc::new(StageNode::new("a", "a")))
        .add_edge("a", END);
    let err = builder.compile().unwrap_err();
    assert!(matches!(err, CompileError::MissingEntry));
}

#[test]
fn multiple_entries_fail() {
    let mut builder = GraphBuilder::new(basic_schema());
    builder
        .add_node(Arc::new(StageNode::new("a", "a")))
        .add_node(Arc::new(StageNode::new("b", "b")))
        .add_edge(START, "a")
        .add_edge(START, "b")
        .add_edge("a", END)
        .add_edge("b", END);
    let err = builder.compile().unwrap_err();
    assert!(matches!(err, CompileError::MultipleEntries));
}

#[test]
fn duplicate_outgoing_edge_fails() {
    let mut builder = GraphBuilder::new(basic_schema());
    builder
        .add_node(Arc::new(StageNode::new("a", "a")))
        .add_node(Arc::new(StageNode::new("b", "b")))
        .add_edge(START, "a")
        .add_edge("a", "b")
        .add_edge("a", END)
        .add_edge("b", END);
    let err = builder.compile().unwrap_err();
    assert!(matches!(err, CompileError::DuplicateEdge(id) if id == "a"));
}

#[test]
fn edge_and_conditional_on_same_node_fails() {
    let mut builder = GraphBuilder::new(basic_schema());
    builder
        .add_node(Arc::new(StageNode::new("a", "a")))
        .add_node(Arc::new(StageNode::new("b", "b")))
        .add_edge(START, "a")
        .add_edge("a", "b")
        .add_edge("b", END)
        .add_conditional_edges(
            "a",
            label_router("go"),
            HashMap::from([("go".to_string(), "b".to_string())]),
        );
    let err = builder.compile().unwrap_err();
    assert!(matches!(err, CompileError::NodeHasBothEdgeAndConditional(id) if id == "a"));
}

#[test]
fn path_map_to_unknown_target_fails() {
    let mut builder = GraphBuilder::new(basic_schema());
    builder
        .add_node(Arc::new(StageNode::new("a", "a")))
        .add_edge(START, "a")
        .add_conditional_edges(
            "a",
            label_router("go"),
            HashMap::from([("go".to_string(), "ghost".to_string())]),
        );
    let err = builder.compile().unwrap_err();
    assert!(matches!(
        err,
        CompileError::InvalidPathMapTarget { label, target } if label == "go" && target == "ghost"
    ));
}

#[test]
fn unknown_error_node_fails() {
    let mut builder = GraphBuilder::new(basic_schema());
    builder
        .add_node(Arc::new(StageNode::new("a", "a")))
        .add_edge(START, "a")
        .add_edge("a", END);
    let err = builder.with_error_node("ghost").compile().unwrap_err();
    assert!(matches!(err, CompileError::UnknownErrorNode(id) if id == "ghost"));
}

#[test]
fn cycle_with_no_terminal_fails() {
    let mut builder = GraphBuilder::new(basic_schema());
    builder
        .add_node(Arc::new(StageNode::new("a", "a")))
        .add_node(Arc::new(StageNode::new("b", "b")))
        .add_edge(START, "a")
        .add_edge("a", "b")
        .add_edge("b", "a");
    let err = builder.compile().unwrap_err();
    assert!(matches!(err, CompileError::MissingTerminal));
}

/// Unreachable nodes only warn; the graph still compiles.
#[test]
fn unreachable_node_compiles() {
    let mut builder = GraphBuilder::new(basic_schema());
    builder
        .add_node(Arc::new(StageNode::new("a", "a")))
        .add_node(Arc::new(StageNode::new("island", "x")))
        .add_edge(START, "a")
        .add_edge("a", END)
        .add_edge("island", END);
    let graph = builder.compile().unwrap();
    assert_eq!(graph.list_nodes(), vec!["a".to_string(), "island".to_string()]);
}
