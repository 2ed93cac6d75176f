//! The per-request prefill processing pipeline.
//!
//! For each request: ask the selector for a node, enqueue the request there,
//! walk the request's block list doing hit/miss accounting against the node's
//! cache, evict under memory pressure, and accumulate statistics.
//!
//! The pipeline is single-threaded and cooperative: one request is processed
//! end-to-end before the next, and the periodic migration check inside the
//! migrating selectors is a synchronous sub-step of selection.

use crate::stats::{NodeStats, RunReport, SimulationStats};
use prefillsim_routing::{NodeSelector, PrefillNode, Request, BLOCK_MEMORY_MB};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("no available node")]
    NoNodeAvailable,
}

/// Outcome of processing one request.
#[derive(Debug, Clone)]
pub struct PrefillResult {
    /// ID of the node that served the request.
    pub node_id: String,
    /// Blocks found in the node's cache.
    pub cache_hits: u32,
    /// Blocks that had to be admitted.
    pub cache_misses: u32,
    /// The request's block IDs, in processing order.
    pub processed_blocks: Vec<u64>,
    /// Modeled time to pull missed blocks over the network, in ms.
    pub transfer_time_ms: f64,
    /// Modeled prefill compute time, in ms.
    pub process_time_ms: f64,
}

/// Modeled prefill compute cost per input token, in ms.
const PROCESS_TIME_PER_TOKEN_MS: f64 = 0.01;

/// Request processor that drives a selector and accumulates run statistics.
pub struct PrefillProcessor {
    selector: Box<dyn NodeSelector>,
    total_requests: u64,
    total_hits: u64,
    total_misses: u64,
    node_stats: BTreeMap<String, NodeStats>,
}

impl PrefillProcessor {
    pub fn new(selector: Box<dyn NodeSelector>) -> Self {
        Self {
            selector,
            total_requests: 0,
            total_hits: 0,
            total_misses: 0,
            node_stats: BTreeMap::new(),
        }
    }

    /// Name of the attached selector.
    pub fn selector_name(&self) -> &str {
        self.selector.name()
    }

    /// Process one request against the cluster.
    pub fn process(
        &mut self,
        request: &Request,
        nodes: &mut [PrefillNode],
    ) -> Result<PrefillResult, ProcessError> {
        let selected = self
            .selector
            .select(request, nodes)
            .ok_or(ProcessError::NoNodeAvailable)?;
        let node = &mut nodes[selected];

        node.enqueue(request.clone());

        let stats = self
            .node_stats
            .entry(node.id.clone())
            .or_insert_with(|| NodeStats {
                node_id: node.id.clone(),
                ..Default::default()
            });

        let mut cache_hits = 0u32;
        let mut cache_misses = 0u32;

        for &hash_id in &request.hash_ids {
            if node.touch_block(hash_id) {
                cache_hits += 1;
                node.total_hits += 1;
            } else {
                cache_misses += 1;
                node.total_misses += 1;

                // Reclaim until the new block fits. Eviction returning no
                // victim under pressure is survivable: the block is admitted
                // anyway and the stall recorded.
                while node.used_memory_mb + BLOCK_MEMORY_MB > node.max_memory_mb
                    && !node.blocks.is_empty()
                {
                    match node.evict_one() {
                        Some(_) => stats.evicted_blocks += 1,
                        None => {
                            warn!(
                                node = %node.id,
                                used_memory_mb = node.used_memory_mb,
                                max_memory_mb = node.max_memory_mb,
                                "eviction exhausted under memory pressure"
                            );
                            stats.eviction_stalls += 1;
                            break;
                        }
                    }
                }

                node.admit_block(hash_id);
            }
        }

        self.total_requests += 1;
        self.total_hits += u64::from(cache_hits);
        self.total_misses += u64::from(cache_misses);
        stats.total_requests += 1;
        stats.total_hits += u64::from(cache_hits);
        stats.total_misses += u64::from(cache_misses);

        Ok(PrefillResult {
            node_id: node.id.clone(),
            cache_hits,
            cache_misses,
            processed_blocks: request.hash_ids.clone(),
            transfer_time_ms: f64::from(cache_misses) * BLOCK_MEMORY_MB
                / node.network_bandwidth_gbps,
            process_time_ms: f64::from(request.input_length) * PROCESS_TIME_PER_TOKEN_MS,
        })
    }

    /// Aggregate statistics for the run so far.
    pub fn statistics(&self) -> SimulationStats {
        let total = self.total_hits + self.total_misses;
        let mut node_stats = self.node_stats.clone();
        for stats in node_stats.values_mut() {
            stats.finalize();
        }
        SimulationStats {
            selector: self.selector.name().to_string(),
            total_requests: self.total_requests,
            total_hits: self.total_hits,
            total_misses: self.total_misses,
            hit_rate: if total > 0 {
                self.total_hits as f64 / total as f64
            } else {
                0.0
            },
            node_stats,
        }
    }

    /// Finish the run, yielding statistics plus the selector's migration
    /// history.
    pub fn into_report(self) -> RunReport {
        let stats = self.statistics();
        RunReport {
            stats,
            migrations: self.selector.migration_history().to_vec(),
        }
    }
}
