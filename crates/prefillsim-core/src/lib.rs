//! Prefillsim — trace-driven simulator for cache-aware LLM prefill routing.
//!
//! This crate provides the per-request processing pipeline that ties the
//! routing policies from `prefillsim-routing` to a simulated cluster of
//! prefill nodes, plus trace ingestion, configuration, and statistics.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐     ┌────────────┐     ┌──────────────┐
//! │  Trace   │────▶│ Processor  │────▶│  Statistics  │
//! │ (JSONL)  │     │ (per-req)  │     │   Report     │
//! └──────────┘     └─────┬──────┘     └──────────────┘
//!                        │
//!                ┌───────┴───────┐
//!                │   Selector    │
//!                │  (+migration) │
//!                └───────┬───────┘
//!                        │
//!          ┌─────────────┼─────────────┐
//!          ▼             ▼             ▼
//!    ┌──────────┐  ┌──────────┐  ┌──────────┐
//!    │  Node 0  │  │  Node 1  │  │  Node N  │
//!    │ KV cache │  │ KV cache │  │ KV cache │
//!    │  queue   │  │  queue   │  │  queue   │
//!    └──────────┘  └──────────┘  └──────────┘
//! ```

pub mod config;
pub mod processor;
pub mod stats;
pub mod trace;

// Re-export key types for convenience.
pub use config::{ConfigError, SimConfig};
pub use processor::{PrefillProcessor, PrefillResult, ProcessError};
pub use stats::{format_comparison_table, format_table, RunReport, SimulationStats};
pub use trace::{load_trace, parse_trace, write_trace};

use prefillsim_routing::{eviction_by_name, selector_by_name, PrefillNode, Request};
use tracing::{debug, warn};

/// Build the cluster's nodes from configuration.
pub fn build_nodes(config: &SimConfig) -> Result<Vec<PrefillNode>, ConfigError> {
    (0..config.cluster.node_count)
        .map(|i| {
            let eviction = eviction_by_name(&config.eviction.policy).ok_or_else(|| {
                ConfigError::Validation(format!(
                    "unknown eviction policy '{}'",
                    config.eviction.policy
                ))
            })?;
            Ok(PrefillNode::new(
                format!("node-{}", i),
                config.cluster.cache_size_blocks as usize,
                f64::from(config.cluster.max_memory_mb),
                config.cluster.network_bandwidth_gbps,
                eviction,
            ))
        })
        .collect()
}

/// Run a complete simulation: build nodes, process every request in order,
/// and aggregate the run report.
pub fn run_simulation(config: &SimConfig, requests: &[Request]) -> Result<RunReport, ConfigError> {
    let params = config.selector_params();
    let selector = selector_by_name(&config.routing.selector, &params).ok_or_else(|| {
        ConfigError::Validation(format!("unknown selector '{}'", config.routing.selector))
    })?;

    let mut nodes = build_nodes(config)?;
    let mut processor = PrefillProcessor::new(selector);

    for (i, request) in requests.iter().enumerate() {
        if let Err(err) = processor.process(request, &mut nodes) {
            // Skipped request; the run continues.
            warn!(request = i, %err, "request skipped");
        }
        if (i + 1) % 1000 == 0 {
            debug!(processed = i + 1, total = requests.len(), "progress");
        }
    }

    Ok(processor.into_report())
}

/// Run several selectors over the same trace and config, returning one
/// report per selector that resolves.
pub fn compare_selectors(
    config: &SimConfig,
    requests: &[Request],
    selector_names: &[&str],
) -> Vec<RunReport> {
    selector_names
        .iter()
        .filter_map(|name| {
            let mut cfg = config.clone();
            cfg.routing.selector = name.to_string();
            run_simulation(&cfg, requests).ok()
        })
        .collect()
}
