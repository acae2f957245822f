//! # Trellis
//!
//! A directed-graph workflow orchestration engine in Rust. Build workflows
//! with a **state-in, state-out** design: one schema-declared shared state
//! flows through nodes, each returning a partial update that merges back
//! through per-field reducers.
//!
//! ## Design principles
//!
//! - **Declared state**: Every field is registered in a [`StateSchema`]
//!   with an explicit merge policy ([`Reducer::Replace`] or
//!   [`Reducer::Append`]); unknown fields are rejected.
//! - **Nodes write updates, not state**: A [`Node`] returns a
//!   [`StateUpdate`]; only the engine merges.
//! - **Fail soft, route hard**: Node failures become error records in the
//!   state and the run continues; only a malformed graph
//!   ([`CompileError`]) or an undeclared route ([`ExecutionError`])
//!   aborts.
//! - **Parallelism with a deterministic join**: Fan-out branches run
//!   concurrently, merge in completion order, and converge before the
//!   next step is scheduled.
//!
//! ## Features
//!
//! - **Graph building**: [`GraphBuilder`] with static edges, conditional
//!   edges ([`RouteOutcome`], [`DynamicDispatch`] fan-out) and compile-time
//!   validation.
//! - **Execution**: [`CompiledGraph::invoke`] for state-in/state-out runs,
//!   [`CompiledGraph::stream`] for incremental [`StreamEvent`]s.
//! - **Node wrapper**: memoization via [`CacheStore`], knowledge retrieval
//!   via [`KnowledgeStore`], capability handles, [`RetryPolicy`] and
//!   per-node timeouts applied uniformly around every body.
//! - **Capabilities**: [`CapabilityRegistry`] with validated
//!   [`ActionSpec`]s and never-throwing [`ActionResult`]s.
//! - **Bounded loops**: [`IterationController`] for
//!   research/analyze/synthesize refinement loops with a hard iteration
//!   ceiling.
//! - **Visualization**: [`generate_dot`], [`generate_text`].
//!
//! ## Main modules
//!
//! - [`graph`]: [`GraphBuilder`], [`CompiledGraph`], [`Node`], routing and
//!   retry types.
//! - [`state`]: [`StateSchema`], [`WorkflowState`], [`StateUpdate`],
//!   [`ErrorRecord`].
//! - [`channels`]: merge primitives backing the reducers.
//! - [`cache`]: [`CacheStore`], [`InMemoryCache`].
//! - [`knowledge`]: [`KnowledgeStore`], [`InMemoryKnowledgeStore`],
//!   importance-ranked retrieval.
//! - [`capability`]: [`Capability`], [`CapabilityRegistry`], health and
//!   status reporting.
//! - [`iteration`]: [`IterationController`] and the iteration state
//!   fields.
//! - [`stream`]: [`StreamMode`], [`StreamEvent`].
//! - [`config`]: [`RunConfig`].
//!
//! Key types are re-exported at the crate root:
//! `use trellis::{GraphBuilder, Node, RunConfig, WorkflowState};`.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use serde_json::json;
//! use trellis::{
//!     GraphBuilder, Node, NodeContext, NodeError, NodeOutput, Reducer, RunConfig, StateSchema,
//!     StateUpdate, WorkflowState, END, START,
//! };
//!
//! struct Greet;
//!
//! #[async_trait]
//! impl Node for Greet {
//!     fn id(&self) -> &str {
//!         "greet"
//!     }
//!
//!     async fn run(
//!         &self,
//!         state: &WorkflowState,
//!         _ctx: &NodeContext,
//!     ) -> Result<NodeOutput, NodeError> {
//!         let name = state.get_str("name").unwrap_or_else(|| "world".into());
//!         Ok(NodeOutput::update(
//!             StateUpdate::new().set("greeting", json!(format!("hello, {name}"))),
//!         ))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = StateSchema::builder()
//!     .field("name", Reducer::Replace)
//!     .field("greeting", Reducer::Replace)
//!     .build();
//!
//! let mut builder = GraphBuilder::new(schema);
//! builder.add_node(Arc::new(Greet));
//! builder.add_edge(START, "greet");
//! builder.add_edge("greet", END);
//! let graph = builder.compile()?;
//!
//! let state = graph.initial_state([("name".to_string(), json!("trellis"))])?;
//! let result = graph.invoke(state, RunConfig::default()).await?;
//! assert_eq!(result.get_str("greeting").as_deref(), Some("hello, trellis"));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod capability;
pub mod channels;
pub mod config;
pub mod error;
pub mod graph;
pub mod iteration;
pub mod knowledge;
pub mod state;
pub mod stream;

pub use cache::{CacheError, CacheStore, InMemoryCache};
pub use capability::{
    ActionResult, ActionSpec, Capability, CapabilityError, CapabilityHealth, CapabilityRegistry,
    CapabilityStatus,
};
pub use channels::{Channel, ChannelError, LastValue, Topic};
pub use config::RunConfig;
pub use error::{ExecutionError, NodeError};
pub use graph::{
    generate_dot, generate_text, CapabilityHandles, CompileError, CompiledGraph, ConditionalRouter,
    DynamicDispatch, GraphBuilder, KnowledgeWrite, Next, Node, NodeContext, NodeMetadata,
    NodeOutput, NodeStats, RetryPolicy, RouteOutcome, RouterFn, END, START,
};
pub use iteration::{
    declare_iteration_fields, IterationController, StopPredicate, ITERATION_COUNT_FIELD,
    ITERATION_LIMIT_FIELD,
};
pub use knowledge::{
    InMemoryKnowledgeStore, KnowledgeError, KnowledgeQuery, KnowledgeRecord, KnowledgeStore,
};
pub use state::{
    ErrorRecord, Reducer, StateError, StateSchema, StateSchemaBuilder, StateUpdate, WorkflowState,
};
pub use stream::{StreamEvent, StreamMode};
