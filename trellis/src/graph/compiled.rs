//! Compiled workflow graph and its execution engine.
//!
//! Execution proceeds in supersteps over a frontier of tasks. All tasks in
//! a frontier run concurrently against a snapshot of the shared state;
//! their updates are merged in completion order as they finish, and only
//! then is the next frontier resolved. A node reached by several completed
//! branches is scheduled once (the implicit join); dynamic dispatch
//! fan-outs schedule one task per dispatch, each with its own seed.
//!
//! Node failures never abort the run: they are recorded into the state's
//! error field and the branch is redirected to the error node (when one is
//! declared) or dropped. Only routing failures abort.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::RunConfig;
use crate::error::{ExecutionError, NodeError};
use crate::iteration::ITERATION_LIMIT_FIELD;
use crate::state::{ErrorRecord, StateError, StateSchema, StateUpdate, WorkflowState};
use crate::stream::{StreamEvent, StreamMode};

use super::builder::END;
use super::conditional::{NextEntry, Resolved};
use super::logging::{log_node_failure, log_run_complete, log_run_error, log_run_start};
use super::node::{Next, Node, NodeOutput};
use super::wrapper::{NodeRunner, NodeStats};

/// One scheduled node instance within a superstep.
#[derive(Debug, Clone)]
struct Task {
    node_id: String,
    /// Per-instance seed for dynamic dispatch; merged into the instance's
    /// snapshot only, never the shared state.
    seed: Option<StateUpdate>,
    branch_index: usize,
}

/// Outcome of one task, recorded in merge (completion) order.
struct Completed {
    node_id: String,
    next: Next,
    failed: bool,
}

/// Static description of one node, for introspection.
#[derive(Debug, Clone)]
pub struct NodeMetadata {
    /// Node id.
    pub id: String,
    /// Capabilities the node declares.
    pub required_capabilities: Vec<String>,
    /// Static successor, when the node has an unconditional edge.
    pub static_target: Option<String>,
    /// Whether the node routes through conditional edges.
    pub conditional: bool,
    /// Whether the node has no outgoing edges at all.
    pub terminal: bool,
}

/// Stream plumbing threaded through a streamed run.
struct StreamCtx {
    tx: mpsc::Sender<StreamEvent>,
    modes: HashSet<StreamMode>,
}

impl StreamCtx {
    fn wants(&self, mode: StreamMode) -> bool {
        self.modes.contains(&mode) || self.modes.contains(&StreamMode::Debug)
    }

    async fn emit(&self, event: StreamEvent) {
        // A dropped receiver just stops emission; the run itself continues.
        let _ = self.tx.send(event).await;
    }
}

/// An immutable, validated workflow graph ready to execute.
///
/// Produced by [`GraphBuilder::compile`](super::GraphBuilder::compile).
/// Cheap to clone; runs share the node execution wrapper and its metrics.
#[derive(Clone)]
pub struct CompiledGraph {
    pub(super) schema: Arc<StateSchema>,
    pub(super) nodes: HashMap<String, Arc<dyn Node>>,
    pub(super) entry: String,
    pub(super) next_map: HashMap<String, NextEntry>,
    pub(super) error_node: Option<String>,
    pub(super) runner: Arc<NodeRunner>,
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("entry", &self.entry)
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("error_node", &self.error_node)
            .finish_non_exhaustive()
    }
}

impl CompiledGraph {
    /// Returns the schema the graph's states are built from.
    pub fn schema(&self) -> &Arc<StateSchema> {
        &self.schema
    }

    /// Returns the entry node id.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Creates an empty state for this graph's schema.
    pub fn new_state(&self) -> WorkflowState {
        WorkflowState::new(self.schema.clone())
    }

    /// Creates a state seeded with initial values.
    pub fn initial_state(
        &self,
        values: impl IntoIterator<Item = (String, serde_json::Value)>,
    ) -> Result<WorkflowState, StateError> {
        WorkflowState::with_values(self.schema.clone(), values)
    }

    /// Node ids, sorted.
    pub fn list_nodes(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.nodes.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Static metadata for one node, or `None` if unknown.
    pub fn node_metadata(&self, node_id: &str) -> Option<NodeMetadata> {
        let node = self.nodes.get(node_id)?;
        let next = self.next_map.get(node_id);
        Some(NodeMetadata {
            id: node_id.to_string(),
            required_capabilities: node.required_capabilities(),
            static_target: match next {
                Some(NextEntry::Unconditional(to)) => Some(to.clone()),
                _ => None,
            },
            conditional: matches!(next, Some(NextEntry::Conditional(_))),
            terminal: next.is_none(),
        })
    }

    /// Per-node execution counters accumulated across runs of this graph.
    pub fn metrics(&self) -> HashMap<String, NodeStats> {
        self.runner.stats()
    }

    /// Runs the graph to completion and returns the final merged state.
    ///
    /// Node failures are recorded in the state's error field; only an
    /// [`ExecutionError`] (empty graph or routing failure) aborts.
    pub async fn invoke(
        &self,
        state: WorkflowState,
        config: RunConfig,
    ) -> Result<WorkflowState, ExecutionError> {
        let mut state = state;
        log_run_start(config.run_id.as_deref());
        match self.run_inner(&mut state, &config, None).await {
            Ok(steps) => {
                log_run_complete(config.run_id.as_deref(), steps);
                Ok(state)
            }
            Err(err) => {
                log_run_error(config.run_id.as_deref(), &err);
                Err(err)
            }
        }
    }

    /// Runs the graph, emitting [`StreamEvent`]s for the requested modes.
    ///
    /// The returned stream ends when the run finishes; a fatal error is
    /// surfaced as a final [`StreamEvent::RunError`].
    pub fn stream(
        &self,
        state: WorkflowState,
        config: RunConfig,
        modes: impl Into<HashSet<StreamMode>>,
    ) -> ReceiverStream<StreamEvent> {
        let (tx, rx) = mpsc::channel(128);
        let graph = self.clone();
        let modes = modes.into();
        tokio::spawn(async move {
            let mut state = state;
            let ctx = StreamCtx {
                tx: tx.clone(),
                modes,
            };
            log_run_start(config.run_id.as_deref());
            match graph.run_inner(&mut state, &config, Some(&ctx)).await {
                Ok(steps) => log_run_complete(config.run_id.as_deref(), steps),
                Err(err) => {
                    log_run_error(config.run_id.as_deref(), &err);
                    ctx.emit(StreamEvent::RunError(err.to_string())).await;
                }
            }
        });
        ReceiverStream::new(rx)
    }

    /// The superstep loop. Returns the number of supersteps executed.
    async fn run_inner(
        &self,
        state: &mut WorkflowState,
        config: &RunConfig,
        stream: Option<&StreamCtx>,
    ) -> Result<usize, ExecutionError> {
        if self.nodes.is_empty() || !self.nodes.contains_key(&self.entry) {
            return Err(ExecutionError::EmptyGraph);
        }
        self.seed_iteration_limit(state, config);

        let mut frontier = vec![Task {
            node_id: self.entry.clone(),
            seed: None,
            branch_index: 0,
        }];
        let mut steps = 0;
        while !frontier.is_empty() {
            steps += 1;
            let completed = self
                .superstep(state, std::mem::take(&mut frontier), config, stream)
                .await;
            frontier = self.resolve_next(state, &completed)?;
        }
        Ok(steps)
    }

    /// Seeds the iteration ceiling into the state when the schema declares
    /// the field and nothing set it yet.
    fn seed_iteration_limit(&self, state: &mut WorkflowState, config: &RunConfig) {
        if self.schema.reducer(ITERATION_LIMIT_FIELD).is_none()
            || state.get(ITERATION_LIMIT_FIELD).is_some()
        {
            return;
        }
        let update = StateUpdate::new().set(ITERATION_LIMIT_FIELD, json!(config.max_iterations));
        // The field is declared; apply cannot fail.
        let _ = state.apply(&update);
    }

    /// Runs one frontier concurrently and merges results in completion
    /// order.
    async fn superstep(
        &self,
        state: &mut WorkflowState,
        tasks: Vec<Task>,
        config: &RunConfig,
        stream: Option<&StreamCtx>,
    ) -> Vec<Completed> {
        let mut completed = Vec::new();
        let mut set: JoinSet<(String, Result<NodeOutput, NodeError>)> = JoinSet::new();
        let mut spawned: HashMap<tokio::task::Id, String> = HashMap::new();

        for task in tasks {
            // Compile validation and resolve_next guarantee registration.
            let Some(node) = self.nodes.get(&task.node_id).cloned() else {
                continue;
            };
            let mut snapshot = state.clone();
            if let Some(seed) = &task.seed {
                if let Err(err) = snapshot.apply(seed) {
                    completed.push(
                        self.record_failure(
                            state,
                            stream,
                            &task.node_id,
                            &format!("dispatch seed rejected: {err}"),
                        )
                        .await,
                    );
                    continue;
                }
            }
            if let Some(ctx) = stream {
                if ctx.wants(StreamMode::Tasks) {
                    ctx.emit(StreamEvent::TaskStart {
                        node_id: task.node_id.clone(),
                        branch_index: task.branch_index,
                    })
                    .await;
                }
            }
            let runner = self.runner.clone();
            let run_config = config.clone();
            let node_id = task.node_id.clone();
            let branch_index = task.branch_index;
            let handle = set.spawn(async move {
                let result = runner.run(node, snapshot, run_config, branch_index).await;
                (node_id, result)
            });
            spawned.insert(handle.id(), task.node_id);
        }

        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((_, (node_id, Ok(output)))) => match state.apply(&output.update) {
                    Ok(()) => {
                        if let Some(ctx) = stream {
                            if ctx.wants(StreamMode::Tasks) {
                                ctx.emit(StreamEvent::TaskEnd {
                                    node_id: node_id.clone(),
                                    result: Ok(()),
                                })
                                .await;
                            }
                            if ctx.wants(StreamMode::Updates) {
                                ctx.emit(StreamEvent::Updates {
                                    node_id: node_id.clone(),
                                    update: output.update.clone(),
                                })
                                .await;
                            }
                            if ctx.wants(StreamMode::Values) {
                                ctx.emit(StreamEvent::Values(state.clone())).await;
                            }
                        }
                        completed.push(Completed {
                            node_id,
                            next: output.next,
                            failed: false,
                        });
                    }
                    Err(err) => {
                        completed.push(
                            self.record_failure(state, stream, &node_id, &err.to_string())
                                .await,
                        );
                    }
                },
                Ok((_, (node_id, Err(err)))) => {
                    completed.push(
                        self.record_failure(state, stream, &node_id, &err.to_string())
                            .await,
                    );
                }
                Err(join_err) => {
                    let node_id = spawned
                        .get(&join_err.id())
                        .cloned()
                        .unwrap_or_else(|| "<unknown>".to_string());
                    completed.push(
                        self.record_failure(
                            state,
                            stream,
                            &node_id,
                            &format!("node task aborted: {join_err}"),
                        )
                        .await,
                    );
                }
            }
        }
        completed
    }

    /// Records a node failure into state and marks the branch failed.
    async fn record_failure(
        &self,
        state: &mut WorkflowState,
        stream: Option<&StreamCtx>,
        node_id: &str,
        message: &str,
    ) -> Completed {
        log_node_failure(node_id, message);
        state.push_error(ErrorRecord::new(node_id, message));
        if let Some(ctx) = stream {
            if ctx.wants(StreamMode::Tasks) {
                ctx.emit(StreamEvent::TaskEnd {
                    node_id: node_id.to_string(),
                    result: Err(message.to_string()),
                })
                .await;
            }
        }
        Completed {
            node_id: node_id.to_string(),
            next: Next::Continue,
            failed: true,
        }
    }

    /// Resolves the next frontier from the completed tasks of a superstep.
    ///
    /// Single-target routes are deduplicated by node id (several completed
    /// branches converging on one node produce one task, after all their
    /// updates are merged). Fan-out dispatches are never deduplicated:
    /// each dispatch is its own instance.
    fn resolve_next(
        &self,
        state: &WorkflowState,
        completed: &[Completed],
    ) -> Result<Vec<Task>, ExecutionError> {
        let mut next = Vec::new();
        let mut seen_targets: HashSet<String> = HashSet::new();
        let mut routed_sources: HashSet<&str> = HashSet::new();

        for done in completed {
            if done.failed {
                if let Some(error_node) = &self.error_node {
                    if error_node != &done.node_id && seen_targets.insert(error_node.clone()) {
                        next.push(Task {
                            node_id: error_node.clone(),
                            seed: None,
                            branch_index: 0,
                        });
                    }
                }
                continue;
            }
            if done.next == Next::End {
                continue;
            }
            // One route decision per node id, after the join.
            if !routed_sources.insert(done.node_id.as_str()) {
                continue;
            }
            match self.next_map.get(&done.node_id) {
                None => {}
                Some(NextEntry::Unconditional(target)) => {
                    if target != END && seen_targets.insert(target.clone()) {
                        next.push(Task {
                            node_id: target.clone(),
                            seed: None,
                            branch_index: 0,
                        });
                    }
                }
                Some(NextEntry::Conditional(router)) => {
                    match router.resolve(&done.node_id, state)? {
                        Resolved::Target(target) => {
                            if target != END && seen_targets.insert(target.clone()) {
                                next.push(Task {
                                    node_id: target,
                                    seed: None,
                                    branch_index: 0,
                                });
                            }
                        }
                        Resolved::FanOut(dispatches) => {
                            for dispatch in dispatches {
                                if !self.nodes.contains_key(&dispatch.target) {
                                    return Err(ExecutionError::Routing {
                                        node: done.node_id.clone(),
                                        label: dispatch.target,
                                    });
                                }
                                next.push(Task {
                                    node_id: dispatch.target,
                                    seed: Some(dispatch.seed),
                                    branch_index: 0,
                                });
                            }
                        }
                    }
                }
            }
        }
        for (index, task) in next.iter_mut().enumerate() {
            task.branch_index = index;
        }
        Ok(next)
    }
}
