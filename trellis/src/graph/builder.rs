//! Workflow graph builder.
//!
//! Collects nodes, static edges and conditional edges, plus the shared
//! services (cache, knowledge store, capability registry) and policies the
//! compiled graph will run with. `compile` validates the shape and
//! produces an immutable [`CompiledGraph`]; an invalid plan never reaches
//! execution.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::cache::CacheStore;
use crate::capability::CapabilityRegistry;
use crate::knowledge::KnowledgeStore;
use crate::state::StateSchema;

use super::compile_error::CompileError;
use super::compiled::CompiledGraph;
use super::conditional::{ConditionalRouter, NextEntry, RouterFn};
use super::node::Node;
use super::retry::RetryPolicy;
use super::wrapper::NodeRunner;

/// Virtual entry node id; the single edge out of it names the entry node.
pub const START: &str = "__start__";
/// Virtual terminal node id; edges and routes to it end a branch.
pub const END: &str = "__end__";

/// Builder for a workflow graph.
pub struct GraphBuilder {
    schema: Arc<StateSchema>,
    nodes: HashMap<String, Arc<dyn Node>>,
    edges: Vec<(String, String)>,
    conditional: HashMap<String, ConditionalRouter>,
    error_node: Option<String>,
    cache: Option<Arc<dyn CacheStore>>,
    knowledge: Option<Arc<dyn KnowledgeStore>>,
    capabilities: Option<Arc<CapabilityRegistry>>,
    retry_policy: RetryPolicy,
}

impl GraphBuilder {
    /// Starts a builder over the given state schema.
    pub fn new(schema: StateSchema) -> Self {
        Self {
            schema: Arc::new(schema),
            nodes: HashMap::new(),
            edges: Vec::new(),
            conditional: HashMap::new(),
            error_node: None,
            cache: None,
            knowledge: None,
            capabilities: None,
            retry_policy: RetryPolicy::None,
        }
    }

    /// Registers a node under its own id. Re-registering an id replaces
    /// the previous node.
    pub fn add_node(&mut self, node: Arc<dyn Node>) -> &mut Self {
        self.nodes.insert(node.id().to_string(), node);
        self
    }

    /// Adds a static edge. Use [`START`] as `from` to declare the entry
    /// node and [`END`] as `to` to terminate a branch.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    /// Declares the entry node. Equivalent to `add_edge(START, node_id)`.
    pub fn set_entry(&mut self, node_id: impl Into<String>) -> &mut Self {
        self.edges.push((START.to_string(), node_id.into()));
        self
    }

    /// Adds conditional edges from `source`: `path` maps the merged state
    /// to a label (or fan-out), and `path_map` maps labels to target node
    /// ids (or [`END`]).
    pub fn add_conditional_edges(
        &mut self,
        source: impl Into<String>,
        path: RouterFn,
        path_map: HashMap<String, String>,
    ) -> &mut Self {
        self.conditional
            .insert(source.into(), ConditionalRouter::new(path, path_map));
        self
    }

    /// Declares the node failed branches are redirected to.
    pub fn with_error_node(mut self, node_id: impl Into<String>) -> Self {
        self.error_node = Some(node_id.into());
        self
    }

    /// Attaches a cache store for node memoization.
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Attaches a knowledge store for node retrieval and summaries.
    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeStore>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    /// Attaches the capability registry nodes draw their handles from.
    pub fn with_capabilities(mut self, capabilities: Arc<CapabilityRegistry>) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Sets the retry policy applied to every node invocation.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Validates the graph shape and produces an executable graph.
    ///
    /// Fatal problems (unknown targets, missing or duplicate entry,
    /// conflicting edges, no terminal) fail compilation. Nodes unreachable
    /// from the entry are logged as a warning but do not fail it.
    pub fn compile(mut self) -> Result<CompiledGraph, CompileError> {
        let mut entry: Option<String> = None;
        let mut static_from: HashSet<String> = HashSet::new();

        for (from, to) in &self.edges {
            if from == START {
                if entry.is_some() {
                    return Err(CompileError::MultipleEntries);
                }
                if to == END || !self.nodes.contains_key(to) {
                    return Err(CompileError::NodeNotFound(to.clone()));
                }
                entry = Some(to.clone());
                continue;
            }
            if !self.nodes.contains_key(from) {
                return Err(CompileError::NodeNotFound(from.clone()));
            }
            if to != END && !self.nodes.contains_key(to) {
                return Err(CompileError::NodeNotFound(to.clone()));
            }
            if !static_from.insert(from.clone()) {
                return Err(CompileError::DuplicateEdge(from.clone()));
            }
        }
        let entry = entry.ok_or(CompileError::MissingEntry)?;

        for (source, router) in &self.conditional {
            if !self.nodes.contains_key(source) {
                return Err(CompileError::NodeNotFound(source.clone()));
            }
            if static_from.contains(source) {
                return Err(CompileError::NodeHasBothEdgeAndConditional(source.clone()));
            }
            for (label, target) in &router.path_map {
                if target != END && !self.nodes.contains_key(target) {
                    return Err(CompileError::InvalidPathMapTarget {
                        label: label.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        if let Some(error_node) = &self.error_node {
            if !self.nodes.contains_key(error_node) {
                return Err(CompileError::UnknownErrorNode(error_node.clone()));
            }
        }

        let mut next_map: HashMap<String, NextEntry> = HashMap::new();
        for (from, to) in &self.edges {
            if from != START {
                next_map.insert(from.clone(), NextEntry::Unconditional(to.clone()));
            }
        }
        for (source, router) in std::mem::take(&mut self.conditional) {
            next_map.insert(source, NextEntry::Conditional(router));
        }

        self.check_terminal(&next_map)?;
        self.warn_unreachable(&entry, &next_map);

        let runner = NodeRunner::new(
            self.cache,
            self.knowledge,
            self.capabilities,
            self.retry_policy,
        );
        Ok(CompiledGraph {
            schema: self.schema,
            nodes: self.nodes,
            entry,
            next_map,
            error_node: self.error_node,
            runner: Arc::new(runner),
        })
    }

    /// At least one way to finish: an edge or route to END, a node with no
    /// outgoing edges (implicitly terminal), or a fan-out-only router (an
    /// empty dispatch list ends its branch).
    fn check_terminal(&self, next_map: &HashMap<String, NextEntry>) -> Result<(), CompileError> {
        let reaches_end = next_map.values().any(|entry| match entry {
            NextEntry::Unconditional(to) => to == END,
            NextEntry::Conditional(router) => {
                router.path_map.is_empty() || router.path_map.values().any(|t| t == END)
            }
        });
        let has_sink = self.nodes.keys().any(|id| !next_map.contains_key(id));
        if reaches_end || has_sink {
            Ok(())
        } else {
            Err(CompileError::MissingTerminal)
        }
    }

    /// Breadth-first walk over declared edges; anything not visited is
    /// unreachable. Dynamic dispatch can only target declared route
    /// targets, so this walk covers it.
    fn warn_unreachable(&self, entry: &str, next_map: &HashMap<String, NextEntry>) {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        visited.insert(entry);
        queue.push_back(entry);
        while let Some(id) = queue.pop_front() {
            let targets: Vec<&str> = match next_map.get(id) {
                Some(NextEntry::Unconditional(to)) => vec![to.as_str()],
                Some(NextEntry::Conditional(router)) => {
                    router.path_map.values().map(|t| t.as_str()).collect()
                }
                None => Vec::new(),
            };
            for target in targets {
                if target != END && visited.insert(target) {
                    queue.push_back(target);
                }
            }
        }
        if let Some(error_node) = &self.error_node {
            visited.insert(error_node);
        }
        let mut unreachable: Vec<&str> = self
            .nodes
            .keys()
            .map(|id| id.as_str())
            .filter(|id| !visited.contains(id))
            .collect();
        unreachable.sort_unstable();
        for id in unreachable {
            tracing::warn!(node_id = id, "node is unreachable from the entry");
        }
    }
}
