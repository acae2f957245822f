//! Workflow graph: builder, compilation, and the execution engine.
//!
//! A graph is assembled with [`GraphBuilder`] (nodes, static edges,
//! conditional edges, shared services), validated by
//! [`GraphBuilder::compile`], and executed as a [`CompiledGraph`] via
//! `invoke` or `stream`. Execution runs in supersteps: each frontier of
//! node instances runs concurrently, updates merge in completion order,
//! then the next frontier is resolved from edges and routes.

mod builder;
mod compile_error;
mod compiled;
mod conditional;
mod logging;
mod node;
mod retry;
mod visualization;
mod wrapper;

pub use builder::{GraphBuilder, END, START};
pub use compile_error::CompileError;
pub use compiled::{CompiledGraph, NodeMetadata};
pub use conditional::{ConditionalRouter, DynamicDispatch, RouteOutcome, RouterFn};
pub use node::{CapabilityHandles, KnowledgeWrite, Next, Node, NodeContext, NodeOutput};
pub use retry::RetryPolicy;
pub use visualization::{generate_dot, generate_text};
pub use wrapper::NodeStats;
