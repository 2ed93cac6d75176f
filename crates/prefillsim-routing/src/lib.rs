//! Routing and cache-management policies for prefillsim.
//!
//! This crate provides the cluster-side data model (blocks, prefill nodes,
//! eviction state) and the policies that act on it:
//!
//! | Selector | Strategy | Best For |
//! |----------|----------|----------|
//! | [`RandomSelector`] | Uniform random | Baseline comparisons |
//! | [`LoadBalancedSelector`] | Shortest queue | Cache-free workloads |
//! | [`CacheAffinitySelector`] | Hits minus load penalty | Simple cache reuse |
//! | [`EnhancedCacheAffinitySelector`] | α/β weighted score | Tunable trade-offs |
//! | [`HotspotMigrationSelector`] | Affinity + periodic migration | Concentrated working sets |
//! | [`PrefixHotspotSelector`] | Prefix runs + predictive replication | Shared prompt prefixes |
//!
//! Eviction policies ([`FifoEviction`], [`LruEviction`], [`LfuEviction`])
//! plug into each node independently of the selector choice.

pub mod cache_affinity;
pub mod eviction;
pub mod hotspot_migration;
pub mod load_balanced;
pub mod node;
pub mod prefix_hotspot;
pub mod prefix_patterns;
pub mod random;
pub mod request;
pub mod traits;

pub use cache_affinity::{CacheAffinitySelector, EnhancedCacheAffinitySelector};
pub use eviction::{EvictionPolicy, FifoEviction, LfuEviction, LruEviction};
pub use hotspot_migration::HotspotMigrationSelector;
pub use load_balanced::LoadBalancedSelector;
pub use node::{Block, PrefillNode, BLOCK_MEMORY_MB, BLOCK_SIZE_TOKENS, MAX_QUEUE_LEN};
pub use prefix_hotspot::PrefixHotspotSelector;
pub use prefix_patterns::{prefix_key, HotspotMetrics, PrefixPattern};
pub use random::RandomSelector;
pub use request::Request;
pub use traits::{cached_hit_count, cached_hit_ratio, MigrationRecord, NodeSelector};

/// Tunable parameters shared by the selector constructors.
#[derive(Debug, Clone)]
pub struct SelectorParams {
    /// Cache affinity weight.
    pub alpha: f64,
    /// Load weight.
    pub beta: f64,
    /// Prefix score weight (prefix-aware selector only).
    pub gamma: f64,
    /// Concentration ratio that marks a node overloaded.
    pub migration_threshold: f64,
    /// Access-rate threshold that marks a block or prefix hot.
    pub hotspot_threshold: f64,
    /// Requests between global migration checks.
    pub migration_interval: u64,
    /// Sliding window size for prefix intensity, in requests.
    pub window_size: u64,
    /// Longest tracked prefix length.
    pub max_prefix_length: usize,
    /// Seed for the random selector.
    pub seed: u64,
}

impl Default for SelectorParams {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            beta: 0.8,
            gamma: 0.8,
            migration_threshold: 0.7,
            hotspot_threshold: 0.1,
            migration_interval: 100,
            window_size: 1000,
            max_prefix_length: 8,
            seed: 42,
        }
    }
}

/// Create a node selector by name.
pub fn selector_by_name(name: &str, params: &SelectorParams) -> Option<Box<dyn NodeSelector>> {
    match name {
        "random" => Some(Box::new(RandomSelector::with_seed(params.seed))),
        "load_balanced" => Some(Box::new(LoadBalancedSelector::new())),
        "cache_affinity" => Some(Box::new(CacheAffinitySelector::new())),
        "enhanced_cache_affinity" => Some(Box::new(EnhancedCacheAffinitySelector::new(
            params.alpha,
            params.beta,
        ))),
        "hotspot_migration" => Some(Box::new(
            HotspotMigrationSelector::new(
                params.alpha,
                params.beta,
                params.migration_threshold,
                params.hotspot_threshold,
            )
            .with_interval(params.migration_interval),
        )),
        "prefix_hotspot" => Some(Box::new(
            PrefixHotspotSelector::new(
                params.alpha,
                params.beta,
                params.gamma,
                params.hotspot_threshold,
            )
            .with_window_size(params.window_size)
            .with_max_prefix_length(params.max_prefix_length),
        )),
        _ => None,
    }
}

/// List all built-in selector names.
pub fn available_selectors() -> Vec<&'static str> {
    vec![
        "random",
        "load_balanced",
        "cache_affinity",
        "enhanced_cache_affinity",
        "hotspot_migration",
        "prefix_hotspot",
    ]
}

/// Create an eviction policy by name.
pub fn eviction_by_name(name: &str) -> Option<Box<dyn EvictionPolicy>> {
    match name {
        "fifo" => Some(Box::new(FifoEviction::new())),
        "lru" => Some(Box::new(LruEviction::new())),
        "lfu" => Some(Box::new(LfuEviction::new())),
        _ => None,
    }
}

/// List all built-in eviction policy names.
pub fn available_evictions() -> Vec<&'static str> {
    vec!["fifo", "lru", "lfu"]
}
