//! Conditional edges: route to the next node (or fan out) based on state.
//!
//! A source node's routing function takes the merged state and returns a
//! [`RouteOutcome`]: either a label looked up in the declared path map, or
//! a list of dynamic dispatches that each spawn one parallel instance of a
//! target node. An undeclared label is a routing error at execution time
//! (labels can be data-dependent, so this cannot be caught at compile
//! time).

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ExecutionError;
use crate::state::{StateUpdate, WorkflowState};

/// Routing function: merged state in, route decision out.
pub type RouterFn = Arc<dyn Fn(&WorkflowState) -> RouteOutcome + Send + Sync>;

/// One parallel instance of a target node spawned by a fan-out.
#[derive(Debug, Clone)]
pub struct DynamicDispatch {
    /// Node to instantiate.
    pub target: String,
    /// Per-instance seed merged on top of the shared state for this
    /// instance only.
    pub seed: StateUpdate,
}

impl DynamicDispatch {
    /// Creates a dispatch with the given seed.
    pub fn new(target: impl Into<String>, seed: StateUpdate) -> Self {
        Self {
            target: target.into(),
            seed,
        }
    }
}

/// Decision returned by a routing function.
pub enum RouteOutcome {
    /// A single label, resolved through the declared path map.
    Label(String),
    /// Fan out: one instance of a target node per dispatch entry.
    FanOut(Vec<DynamicDispatch>),
}

/// Resolved route after path-map lookup.
pub(crate) enum Resolved {
    /// Single target node id (or END).
    Target(String),
    /// Parallel dispatches.
    FanOut(Vec<DynamicDispatch>),
}

/// Conditional edge definition: routing function plus declared path map.
///
/// The path map (label → target node id or END) is the declared label
/// set; a runtime label outside it is an [`ExecutionError::Routing`].
#[derive(Clone)]
pub struct ConditionalRouter {
    path: RouterFn,
    pub(crate) path_map: HashMap<String, String>,
}

impl ConditionalRouter {
    /// Builds a conditional router.
    pub fn new(path: RouterFn, path_map: HashMap<String, String>) -> Self {
        Self { path, path_map }
    }

    /// Resolves the route from the current state.
    pub(crate) fn resolve(
        &self,
        source: &str,
        state: &WorkflowState,
    ) -> Result<Resolved, ExecutionError> {
        match (self.path)(state) {
            RouteOutcome::Label(label) => match self.path_map.get(&label) {
                Some(target) => Ok(Resolved::Target(target.clone())),
                None => Err(ExecutionError::Routing {
                    node: source.to_string(),
                    label,
                }),
            },
            RouteOutcome::FanOut(dispatches) => Ok(Resolved::FanOut(dispatches)),
        }
    }
}

/// How the engine finds the next node after a given node runs.
#[derive(Clone)]
pub enum NextEntry {
    /// Single fixed next node (or END).
    Unconditional(String),
    /// Next node decided by the router from state.
    Conditional(ConditionalRouter),
}
