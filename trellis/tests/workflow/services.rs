//! Shared services through a full graph run: cache memoization,
//! knowledge retrieval and summaries, capability handles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use trellis::{
    ActionSpec, Capability, CapabilityError, CapabilityRegistry, GraphBuilder, InMemoryCache,
    InMemoryKnowledgeStore, KnowledgeQuery, KnowledgeStore, KnowledgeWrite, Node, NodeContext,
    NodeError, NodeOutput, RunConfig, StateUpdate, WorkflowState, END, START,
};

use super::common::basic_schema;

/// Cacheable node keyed on the `query` field; counts body invocations.
struct CachedSearch {
    calls: Arc<AtomicU64>,
}

#[async_trait]
impl Node for CachedSearch {
    fn id(&self) -> &str {
        "cached_search"
    }

    async fn run(
        &self,
        state: &WorkflowState,
        _ctx: &NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let query = state.get_str("query").unwrap_or_default();
        Ok(NodeOutput::update(
            StateUpdate::new().set("sources", json!([format!("hit:{query}")])),
        ))
    }

    fn cache_key(&self, state: &WorkflowState) -> Option<String> {
        state.get_str("query")
    }
}

/// Node that reads retrieved knowledge and writes a summary back.
struct Informed;

#[async_trait]
impl Node for Informed {
    fn id(&self) -> &str {
        "informed"
    }

    async fn run(
        &self,
        _state: &WorkflowState,
        ctx: &NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let notes: Vec<String> = ctx.knowledge.iter().map(|r| r.content.clone()).collect();
        Ok(NodeOutput::update(
            StateUpdate::new().set("sources", json!(notes)),
        ))
    }

    fn knowledge_query(&self, _state: &WorkflowState) -> Option<KnowledgeQuery> {
        Some(KnowledgeQuery::new("").with_kind("finding"))
    }

    fn knowledge_summary(
        &self,
        _state: &WorkflowState,
        _update: &StateUpdate,
    ) -> Option<KnowledgeWrite> {
        Some(KnowledgeWrite {
            content: "summarized findings".to_string(),
            kind: "summary".to_string(),
            importance: 0.5,
            metadata: json!({}),
        })
    }
}

struct WebSearch;

#[async_trait]
impl Capability for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Searches the web"
    }

    fn category(&self) -> &str {
        "search"
    }

    fn actions(&self) -> Vec<ActionSpec> {
        vec![ActionSpec::new("search").required("query")]
    }

    async fn invoke(
        &self,
        _action: &str,
        params: &serde_json::Map<String, Value>,
    ) -> Result<Value, CapabilityError> {
        let query = params["query"].as_str().unwrap_or_default();
        Ok(json!([format!("web:{query}")]))
    }
}

/// Node calling a declared capability through its context handles.
struct Caller;

#[async_trait]
impl Node for Caller {
    fn id(&self) -> &str {
        "caller"
    }

    async fn run(
        &self,
        _state: &WorkflowState,
        ctx: &NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let result = ctx
            .capabilities
            .call("web_search", "search", json!({"query": "rust"}))
            .await;
        if !result.success {
            return Err(NodeError::failed(
                result.error.unwrap_or_else(|| "capability failed".into()),
            ));
        }
        Ok(NodeOutput::update(StateUpdate::new().set(
            "sources",
            result.data.unwrap_or_else(|| json!([])),
        )))
    }

    fn required_capabilities(&self) -> Vec<String> {
        vec!["web_search".to_string()]
    }
}

#[tokio::test]
async fn cache_memoizes_across_runs() {
    let calls = Arc::new(AtomicU64::new(0));
    let mut builder = GraphBuilder::new(basic_schema());
    builder
        .add_node(Arc::new(CachedSearch {
            calls: calls.clone(),
        }))
        .add_edge(START, "cached_search")
        .add_edge("cached_search", END);
    let graph = builder
        .with_cache(Arc::new(InMemoryCache::new()))
        .compile()
        .unwrap();

    let seed = [("query".to_string(), json!("rust"))];
    let first = graph
        .invoke(
            graph.initial_state(seed.clone()).unwrap(),
            RunConfig::default(),
        )
        .await
        .unwrap();
    let second = graph
        .invoke(graph.initial_state(seed).unwrap(), RunConfig::default())
        .await
        .unwrap();

    // The body ran once; the second run replayed the cached update.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.items("sources"), second.items("sources"));
    assert_eq!(graph.metrics()["cached_search"].cache_hits, 1);
}

#[tokio::test]
async fn knowledge_flows_in_and_out() {
    let store = Arc::new(InMemoryKnowledgeStore::new());
    store
        .store("workflow", "rust is fast", "finding", 0.9, json!({}))
        .await
        .unwrap();

    let mut builder = GraphBuilder::new(basic_schema());
    builder
        .add_node(Arc::new(Informed))
        .add_edge(START, "informed")
        .add_edge("informed", END);
    let graph = builder.with_knowledge(store.clone()).compile().unwrap();

    let result = graph
        .invoke(graph.new_state(), RunConfig::default())
        .await
        .unwrap();
    assert_eq!(result.items("sources"), vec![json!("rust is fast")]);

    // The node's summary was stored for later runs.
    let summaries = store
        .retrieve("workflow", &KnowledgeQuery::new("").with_kind("summary"))
        .await
        .unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].content, "summarized findings");
}

#[tokio::test]
async fn capability_call_through_node_context() {
    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(WebSearch));

    let mut builder = GraphBuilder::new(basic_schema());
    builder
        .add_node(Arc::new(Caller))
        .add_edge(START, "caller")
        .add_edge("caller", END);
    let graph = builder
        .with_capabilities(Arc::new(registry))
        .compile()
        .unwrap();

    let result = graph
        .invoke(graph.new_state(), RunConfig::default())
        .await
        .unwrap();
    assert_eq!(result.items("sources"), vec![json!("web:rust")]);
    assert!(result.errors().is_empty());
}

#[tokio::test]
async fn undeclared_capability_fails_softly() {
    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(WebSearch));

    // Caller declares nothing, so the handle refuses the call.
    struct Undeclared;

    #[async_trait]
    impl Node for Undeclared {
        fn id(&self) -> &str {
            "undeclared"
        }

        async fn run(
            &self,
            _state: &WorkflowState,
            ctx: &NodeContext,
        ) -> Result<NodeOutput, NodeError> {
            let result = ctx
                .capabilities
                .call("web_search", "search", json!({"query": "rust"}))
                .await;
            assert!(!result.success);
            Ok(NodeOutput::update(StateUpdate::new()))
        }
    }

    let mut builder = GraphBuilder::new(basic_schema());
    builder
        .add_node(Arc::new(Undeclared))
        .add_edge(START, "undeclared")
        .add_edge("undeclared", END);
    let graph = builder
        .with_capabilities(Arc::new(registry))
        .compile()
        .unwrap();

    let result = graph
        .invoke(graph.new_state(), RunConfig::default())
        .await
        .unwrap();
    assert!(result.errors().is_empty());
}
