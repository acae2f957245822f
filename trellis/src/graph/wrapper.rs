//! Node execution wrapper: cross-cutting behavior around every node body.
//!
//! For each invocation the wrapper checks the cache (short-circuiting the
//! body on a hit), retrieves knowledge for the node context, builds
//! capability handles, runs the body under the retry policy and per-node
//! timeout, and on success writes back the cache entry and any declared
//! knowledge summary. Cache and knowledge failures are logged and
//! swallowed; only the body's own failure (or timeout) fails the node.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;

use crate::cache::CacheStore;
use crate::capability::CapabilityRegistry;
use crate::config::RunConfig;
use crate::error::NodeError;
use crate::knowledge::KnowledgeStore;
use crate::state::WorkflowState;

use super::logging::{log_node_complete, log_node_failure, log_node_start};
use super::node::{CapabilityHandles, Node, NodeContext, NodeOutput};
use super::retry::RetryPolicy;

/// Default owner id for knowledge access when the run config sets none.
const DEFAULT_OWNER: &str = "workflow";

/// Per-node execution counters, exposed through `CompiledGraph::metrics`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeStats {
    /// Body invocations (cache hits excluded).
    pub invocations: u64,
    /// Invocations answered from the cache.
    pub cache_hits: u64,
    /// Failed invocations, counted after retries are exhausted.
    pub failures: u64,
    /// Total wall-clock time spent in successful body invocations.
    pub total_duration_ms: u64,
}

/// Runs node bodies with caching, knowledge access, capability handles,
/// retry and timeout applied uniformly.
pub(crate) struct NodeRunner {
    cache: Option<Arc<dyn CacheStore>>,
    knowledge: Option<Arc<dyn KnowledgeStore>>,
    capabilities: Option<Arc<CapabilityRegistry>>,
    retry_policy: RetryPolicy,
    stats: DashMap<String, NodeStats>,
}

impl NodeRunner {
    pub(crate) fn new(
        cache: Option<Arc<dyn CacheStore>>,
        knowledge: Option<Arc<dyn KnowledgeStore>>,
        capabilities: Option<Arc<CapabilityRegistry>>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            cache,
            knowledge,
            capabilities,
            retry_policy,
            stats: DashMap::new(),
        }
    }

    /// Snapshot of per-node counters.
    pub(crate) fn stats(&self) -> HashMap<String, NodeStats> {
        self.stats
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Executes one node instance against a state snapshot.
    pub(crate) async fn run(
        &self,
        node: Arc<dyn Node>,
        state: WorkflowState,
        config: RunConfig,
        branch_index: usize,
    ) -> Result<NodeOutput, NodeError> {
        let node_id = node.id().to_string();
        if config.enable_tracing {
            log_node_start(&node_id, branch_index);
        }

        let cache_key = node.cache_key(&state);
        if let Some(output) = self.cache_lookup(&node_id, &cache_key).await {
            if config.enable_tracing {
                log_node_complete(&node_id, 0);
            }
            return Ok(output);
        }

        let owner = config
            .owner_id
            .clone()
            .unwrap_or_else(|| DEFAULT_OWNER.to_string());
        let knowledge = self.retrieve_knowledge(&node, &state, &owner).await;
        let capabilities = self.capability_handles(&node);

        let ctx = NodeContext {
            knowledge,
            capabilities,
            config: config.clone(),
            branch_index,
        };

        let started = Instant::now();
        match self.invoke_with_retry(&node, &state, &ctx, &config).await {
            Ok(output) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                {
                    let mut stats = self.stats.entry(node_id.clone()).or_default();
                    stats.invocations += 1;
                    stats.total_duration_ms += duration_ms;
                }
                if config.enable_tracing {
                    log_node_complete(&node_id, duration_ms);
                }
                self.cache_store(&node, &node_id, &cache_key, &output).await;
                self.store_summary(&node, &state, &output, &owner).await;
                Ok(output)
            }
            Err(err) => {
                self.stats.entry(node_id.clone()).or_default().failures += 1;
                log_node_failure(&node_id, &err.to_string());
                Err(err)
            }
        }
    }

    /// Cache-aside read. A malformed cached value is treated as a miss.
    async fn cache_lookup(&self, node_id: &str, key: &Option<String>) -> Option<NodeOutput> {
        let cache = self.cache.as_ref()?;
        let key = key.as_ref()?;
        let value = cache.get(node_id, key).await?;
        match serde_json::from_value(value) {
            Ok(update) => {
                self.stats.entry(node_id.to_string()).or_default().cache_hits += 1;
                tracing::debug!(node_id, key, "cache hit, skipping node body");
                Some(NodeOutput::update(update))
            }
            Err(err) => {
                tracing::warn!(node_id, key, %err, "cached value malformed, ignoring");
                None
            }
        }
    }

    /// Best-effort cache write after a successful invocation.
    async fn cache_store(
        &self,
        node: &Arc<dyn Node>,
        node_id: &str,
        key: &Option<String>,
        output: &NodeOutput,
    ) {
        let (Some(cache), Some(key)) = (&self.cache, key) else {
            return;
        };
        match serde_json::to_value(&output.update) {
            Ok(value) => {
                if let Err(err) = cache.set(node_id, key, value, node.cache_ttl()).await {
                    tracing::warn!(node_id, key, %err, "cache write failed");
                }
            }
            Err(err) => {
                tracing::warn!(node_id, key, %err, "failed to serialize update for cache");
            }
        }
    }

    /// Best-effort knowledge retrieval; failures produce an empty context.
    async fn retrieve_knowledge(
        &self,
        node: &Arc<dyn Node>,
        state: &WorkflowState,
        owner: &str,
    ) -> Vec<crate::knowledge::KnowledgeRecord> {
        let (Some(store), Some(query)) = (&self.knowledge, node.knowledge_query(state)) else {
            return Vec::new();
        };
        match store.retrieve(owner, &query).await {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(node_id = node.id(), %err, "knowledge retrieval failed");
                Vec::new()
            }
        }
    }

    /// Best-effort knowledge summary write after a successful invocation.
    async fn store_summary(
        &self,
        node: &Arc<dyn Node>,
        state: &WorkflowState,
        output: &NodeOutput,
        owner: &str,
    ) {
        let (Some(store), Some(write)) = (
            &self.knowledge,
            node.knowledge_summary(state, &output.update),
        ) else {
            return;
        };
        if let Err(err) = store
            .store(owner, &write.content, &write.kind, write.importance, write.metadata)
            .await
        {
            tracing::warn!(node_id = node.id(), %err, "knowledge summary write failed");
        }
    }

    fn capability_handles(&self, node: &Arc<dyn Node>) -> CapabilityHandles {
        let required = node.required_capabilities();
        if let Some(registry) = &self.capabilities {
            for name in &required {
                if !registry.contains(name) {
                    tracing::warn!(
                        node_id = node.id(),
                        capability = %name,
                        "required capability not registered"
                    );
                }
            }
        } else if !required.is_empty() {
            tracing::warn!(
                node_id = node.id(),
                "node requires capabilities but no registry is configured"
            );
        }
        CapabilityHandles::new(self.capabilities.clone(), required)
    }

    /// Runs the body under the retry policy, each attempt bounded by the
    /// per-node timeout.
    async fn invoke_with_retry(
        &self,
        node: &Arc<dyn Node>,
        state: &WorkflowState,
        ctx: &NodeContext,
        config: &RunConfig,
    ) -> Result<NodeOutput, NodeError> {
        let mut attempt = 0;
        loop {
            let result = match config.per_node_timeout_ms {
                Some(ms) => {
                    match tokio::time::timeout(
                        std::time::Duration::from_millis(ms),
                        node.run(state, ctx),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(NodeError::Timeout(ms)),
                    }
                }
                None => node.run(state, ctx).await,
            };
            match result {
                Ok(output) => return Ok(output),
                Err(err) => {
                    if !self.retry_policy.should_retry(attempt) {
                        return Err(err);
                    }
                    let delay = self.retry_policy.delay(attempt);
                    tracing::debug!(
                        node_id = node.id(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %err,
                        "retrying node after failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
