//! TOML configuration parsing for prefillsim.
//!
//! Defines the configuration schema for a run: cluster sizing, routing
//! selector and its parameters, eviction policy, and trace source.

use prefillsim_routing::SelectorParams;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Top-level run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub cluster: ClusterSection,
    #[serde(default)]
    pub routing: RoutingSection,
    #[serde(default)]
    pub eviction: EvictionSection,
    #[serde(default)]
    pub trace: TraceSection,
}

/// Cluster sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSection {
    /// Number of prefill nodes.
    pub node_count: u32,
    /// Per-node cache capacity in blocks.
    #[serde(default = "default_cache_size_blocks")]
    pub cache_size_blocks: u32,
    /// Per-node modeled memory budget in MB.
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: u32,
    /// Per-node modeled network bandwidth in GB/s.
    #[serde(default = "default_network_bandwidth_gbps")]
    pub network_bandwidth_gbps: f64,
}

fn default_cache_size_blocks() -> u32 {
    500
}
fn default_max_memory_mb() -> u32 {
    2
}
fn default_network_bandwidth_gbps() -> f64 {
    10.0
}

/// Selector choice and tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingSection {
    /// Selector name; see `prefillsim_routing::available_selectors`.
    #[serde(default = "default_selector")]
    pub selector: String,
    /// Cache affinity weight.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Load weight.
    #[serde(default = "default_beta")]
    pub beta: f64,
    /// Prefix score weight.
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    /// Concentration ratio marking a node overloaded.
    #[serde(default = "default_migration_threshold")]
    pub migration_threshold: f64,
    /// Access-rate threshold marking a block or prefix hot.
    #[serde(default = "default_hotspot_threshold")]
    pub hotspot_threshold: f64,
    /// Requests between global migration checks.
    #[serde(default = "default_migration_interval")]
    pub migration_interval: u64,
    /// Sliding window size for prefix intensity, in requests.
    #[serde(default = "default_window_size")]
    pub window_size: u64,
    /// Longest tracked prefix length.
    #[serde(default = "default_max_prefix_length")]
    pub max_prefix_length: u32,
    /// Seed for the random selector.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_selector() -> String {
    "cache_affinity".to_string()
}
fn default_alpha() -> f64 {
    0.6
}
fn default_beta() -> f64 {
    0.8
}
fn default_gamma() -> f64 {
    0.8
}
fn default_migration_threshold() -> f64 {
    0.7
}
fn default_hotspot_threshold() -> f64 {
    0.1
}
fn default_migration_interval() -> u64 {
    100
}
fn default_window_size() -> u64 {
    1000
}
fn default_max_prefix_length() -> u32 {
    8
}
fn default_seed() -> u64 {
    42
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            selector: default_selector(),
            alpha: default_alpha(),
            beta: default_beta(),
            gamma: default_gamma(),
            migration_threshold: default_migration_threshold(),
            hotspot_threshold: default_hotspot_threshold(),
            migration_interval: default_migration_interval(),
            window_size: default_window_size(),
            max_prefix_length: default_max_prefix_length(),
            seed: default_seed(),
        }
    }
}

impl From<&RoutingSection> for SelectorParams {
    fn from(s: &RoutingSection) -> Self {
        SelectorParams {
            alpha: s.alpha,
            beta: s.beta,
            gamma: s.gamma,
            migration_threshold: s.migration_threshold,
            hotspot_threshold: s.hotspot_threshold,
            migration_interval: s.migration_interval,
            window_size: s.window_size,
            max_prefix_length: s.max_prefix_length as usize,
            seed: s.seed,
        }
    }
}

/// Eviction policy choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvictionSection {
    /// Policy name: fifo, lru, or lfu.
    #[serde(default = "default_eviction_policy")]
    pub policy: String,
}

fn default_eviction_policy() -> String {
    "lru".to_string()
}

impl Default for EvictionSection {
    fn default() -> Self {
        Self {
            policy: default_eviction_policy(),
        }
    }
}

/// Trace source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceSection {
    /// Path to the JSONL trace file.
    pub path: Option<String>,
}

impl SimConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster.node_count == 0 {
            return Err(ConfigError::Validation("node_count must be > 0".to_string()));
        }
        if self.cluster.cache_size_blocks == 0 {
            return Err(ConfigError::Validation(
                "cache_size_blocks must be > 0".to_string(),
            ));
        }
        if self.cluster.network_bandwidth_gbps <= 0.0 {
            return Err(ConfigError::Validation(
                "network_bandwidth_gbps must be > 0".to_string(),
            ));
        }
        if !prefillsim_routing::available_selectors().contains(&self.routing.selector.as_str()) {
            return Err(ConfigError::Validation(format!(
                "unknown selector '{}'; available: {:?}",
                self.routing.selector,
                prefillsim_routing::available_selectors(),
            )));
        }
        if !prefillsim_routing::available_evictions().contains(&self.eviction.policy.as_str()) {
            return Err(ConfigError::Validation(format!(
                "unknown eviction policy '{}'; available: {:?}",
                self.eviction.policy,
                prefillsim_routing::available_evictions(),
            )));
        }
        if self.routing.migration_interval == 0 {
            return Err(ConfigError::Validation(
                "migration_interval must be > 0".to_string(),
            ));
        }
        if self.routing.window_size == 0 {
            return Err(ConfigError::Validation("window_size must be > 0".to_string()));
        }
        if self.routing.max_prefix_length < 2 {
            return Err(ConfigError::Validation(
                "max_prefix_length must be >= 2".to_string(),
            ));
        }
        Ok(())
    }

    /// Selector parameters derived from the routing section.
    pub fn selector_params(&self) -> SelectorParams {
        (&self.routing).into()
    }
}
