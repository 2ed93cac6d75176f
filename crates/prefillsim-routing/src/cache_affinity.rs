//! Cache-affinity node selection.
//!
//! Two variants:
//! - [`CacheAffinitySelector`] scores raw hit counts against a fixed-scale
//!   load penalty. Simple and parameter free.
//! - [`EnhancedCacheAffinitySelector`] normalizes both terms and exposes the
//!   α (affinity) / β (load) trade-off. With β = 0 it degenerates into a
//!   greedy affinity selector.

use crate::node::PrefillNode;
use crate::request::Request;
use crate::traits::*;

/// Queue length that counts as one unit of load. Raw queue counts must be
/// comparable to integer hit counts, hence the fixed scale.
const LOAD_SCALE: f64 = 100.0;

/// Weight of the load term in the basic score.
const LOAD_WEIGHT: f64 = 10.0;

/// Basic cache-affinity selector: `hits - 10 * (queue / 100)`.
pub struct CacheAffinitySelector;

impl CacheAffinitySelector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CacheAffinitySelector {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeSelector for CacheAffinitySelector {
    fn select(&mut self, request: &Request, nodes: &mut [PrefillNode]) -> Option<usize> {
        if nodes.is_empty() {
            return None;
        }
        Some(index_of_best(nodes, |_, node| {
            let hits = cached_hit_count(request, node) as f64;
            let load = node.queue_len() as f64 / LOAD_SCALE;
            hits - load * LOAD_WEIGHT
        }))
    }

    fn name(&self) -> &'static str {
        "cache_affinity"
    }
}

/// Enhanced cache-affinity selector with tunable weights:
/// `alpha * hit_ratio - beta * normalized_load`.
///
/// The hit ratio is normalized to [0, 1] by the request's block count; the
/// load fraction (`queue / 100`) is normalized against the cluster average,
/// falling back to the raw fraction when the cluster is idle.
pub struct EnhancedCacheAffinitySelector {
    /// Cache affinity weight. Recommended default 0.6.
    pub alpha: f64,
    /// Load balancing weight. Recommended default 0.8.
    pub beta: f64,
}

impl EnhancedCacheAffinitySelector {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }

    fn score(&self, request: &Request, node: &PrefillNode, avg_load: f64) -> f64 {
        let hit_ratio = cached_hit_ratio(request, node);
        let current_load = node.queue_len() as f64 / LOAD_SCALE;
        let normalized_load = if avg_load > 0.0 {
            current_load / avg_load
        } else {
            current_load
        };
        self.alpha * hit_ratio - self.beta * normalized_load
    }
}

impl NodeSelector for EnhancedCacheAffinitySelector {
    fn select(&mut self, request: &Request, nodes: &mut [PrefillNode]) -> Option<usize> {
        if nodes.is_empty() {
            return None;
        }
        let avg_load = nodes
            .iter()
            .map(|node| node.queue_len() as f64 / LOAD_SCALE)
            .sum::<f64>()
            / nodes.len() as f64;
        Some(index_of_best(nodes, |_, node| {
            self.score(request, node, avg_load)
        }))
    }

    fn name(&self) -> &'static str {
        "enhanced_cache_affinity"
    }
}
