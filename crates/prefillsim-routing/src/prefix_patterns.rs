//! Prefix access-pattern tracking and trend prediction.
//!
//! A prefix is an ordered run of block hash IDs taken from the front of a
//! request, canonically encoded as comma-separated decimals. Per-node
//! [`HotspotMetrics`] track how often each prefix is served, how that rate is
//! trending, and whether the prefix is predicted to become hot.
//!
//! Intensity divides the cumulative hit count by the size of a sliding
//! request window. That is an approximation: exact sliding-window counting
//! would need per-hit timestamps. A ring buffer of hits would tighten it at
//! the cost of extra memory per prefix.

use crate::traits::MigrationRecord;
use std::collections::{HashMap, VecDeque};

/// Samples kept in a prefix's rolling hit-count history.
pub const PATTERN_HISTORY_LEN: usize = 20;

/// Samples required before a trend slope is estimated.
const TREND_MIN_SAMPLES: usize = 5;

/// Weighted-score threshold that sets the predicted-hot flag.
const PREDICTED_HOT_SCORE: f64 = 0.6;

/// Canonical encoding of an ordered block-ID list.
pub fn prefix_key(ids: &[u64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Access statistics for one observed prefix.
#[derive(Debug, Clone)]
pub struct PrefixPattern {
    /// The block IDs forming this prefix.
    pub prefix: Vec<u64>,
    /// Cumulative times a request with this prefix was served.
    pub hit_count: u64,
    /// Hits broken down by serving node.
    pub node_hits: HashMap<String, u64>,
    /// Global access counter value at the most recent hit.
    pub last_hit_seq: u64,
    /// Hits per window step over the current sliding window.
    pub intensity: f64,
    /// Rolling history of hit-count samples (newest at the back).
    pub history: VecDeque<u64>,
    /// Least-squares slope over the history.
    pub trend_slope: f64,
    /// Whether the weighted indicators predict this prefix will become hot.
    pub predicted_hot: bool,
}

impl PrefixPattern {
    pub fn new(prefix: Vec<u64>) -> Self {
        Self {
            prefix,
            hit_count: 0,
            node_hits: HashMap::new(),
            last_hit_seq: 0,
            intensity: 0.0,
            history: VecDeque::new(),
            trend_slope: 0.0,
            predicted_hot: false,
        }
    }

    /// Record one serving of this prefix by `node_id` at `access_counter`.
    pub fn record_hit(&mut self, node_id: &str, access_counter: u64, window_size: u64) {
        self.hit_count += 1;
        self.last_hit_seq = access_counter;
        *self.node_hits.entry(node_id.to_string()).or_insert(0) += 1;
        let window_start = access_counter.saturating_sub(window_size);
        self.intensity = self.hit_count as f64 / (access_counter - window_start + 1) as f64;
    }

    /// Push a hit-count sample and refresh the trend slope and predicted-hot
    /// flag from three weighted indicators: trend (0.4), intensity relative
    /// to the hot-spot threshold (0.4), and recent activity (0.2).
    pub fn update_prediction(&mut self, hotspot_threshold: f64) {
        self.history.push_back(self.hit_count);
        if self.history.len() > PATTERN_HISTORY_LEN {
            self.history.pop_front();
        }
        if self.history.len() >= TREND_MIN_SAMPLES {
            self.trend_slope = least_squares_slope(&self.history);
        }

        let trend_indicator = if self.trend_slope > 0.05 {
            1.0
        } else if self.trend_slope > 0.01 {
            0.5
        } else {
            0.0
        };

        let intensity_ratio = if hotspot_threshold > 0.0 {
            self.intensity / hotspot_threshold
        } else {
            0.0
        };
        let intensity_indicator = if intensity_ratio > 0.7 {
            1.0
        } else if intensity_ratio > 0.5 {
            0.7
        } else if intensity_ratio > 0.3 {
            0.3
        } else {
            0.0
        };

        let recent_indicator = if self.history.len() >= 3 {
            let recent_mean = self
                .history
                .iter()
                .skip(self.history.len() - 3)
                .sum::<u64>() as f64
                / 3.0;
            if recent_mean > self.hit_count as f64 / 2.0 {
                1.0
            } else if recent_mean > self.hit_count as f64 / 4.0 {
                0.6
            } else {
                0.0
            }
        } else {
            0.0
        };

        let score =
            0.4 * trend_indicator + 0.4 * intensity_indicator + 0.2 * recent_indicator;
        self.predicted_hot = score >= PREDICTED_HOT_SCORE;
    }
}

/// Simple least-squares slope over equally spaced samples:
/// `(n * sum(xy) - sum(x) * sum(y)) / (n * sum(x^2) - sum(x)^2)`.
fn least_squares_slope(history: &VecDeque<u64>) -> f64 {
    let n = history.len() as f64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_xx = 0.0;
    for (i, &y) in history.iter().enumerate() {
        let x = i as f64;
        let y = y as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }
    let denom = n * sum_xx - sum_x * sum_x;
    if denom == 0.0 {
        0.0
    } else {
        (n * sum_xy - sum_x * sum_y) / denom
    }
}

/// Hot-spot bookkeeping attached lazily to a node by prefix-aware selectors.
#[derive(Debug, Clone, Default)]
pub struct HotspotMetrics {
    /// Observed prefixes keyed by their canonical encoding.
    pub patterns: HashMap<String, PrefixPattern>,
    /// Replication factor chosen per prefix (copies including the source).
    pub replication: HashMap<String, u32>,
    /// Append-only log of migrations this node sourced.
    pub migration_log: Vec<MigrationRecord>,
}
