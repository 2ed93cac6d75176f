//! Prefix-aware node selection with predictive hot-spot replication.
//!
//! Recognizes ordered sequence prefixes explicitly instead of treating a
//! request's blocks as a bag. Selection rewards nodes holding a contiguous
//! cached run from the start of the request, and a detection pass run before
//! every selection replicates hot (or predicted-hot) prefixes onto lightly
//! loaded nodes so a single holder never becomes the only viable target.
//!
//! Replication copies; it never removes the source's blocks. Each copy lands
//! as a fresh block on the target.

use crate::node::PrefillNode;
use crate::prefix_patterns::{prefix_key, PrefixPattern};
use crate::request::Request;
use crate::traits::*;
use tracing::debug;

/// Queue length treated as one unit of load.
const LOAD_SCALE: f64 = 100.0;

/// Shortest prefix length worth tracking.
const MIN_PREFIX_LENGTH: usize = 2;

/// Trend slope a predicted-hot pattern must sustain before it triggers
/// replication.
const PREDICTED_SLOPE_FLOOR: f64 = 0.1;

/// Prefix-aware selector with reactive and predictive replication.
pub struct PrefixHotspotSelector {
    /// Cache affinity weight.
    pub alpha: f64,
    /// Load score weight.
    pub beta: f64,
    /// Prefix score weight.
    pub gamma: f64,
    /// Intensity above which a prefix is currently hot.
    pub hotspot_threshold: f64,
    /// Sliding window size in requests for intensity accounting.
    pub window_size: u64,
    /// Longest prefix length tracked.
    pub max_prefix_length: usize,
    access_counter: u64,
    history: Vec<MigrationRecord>,
}

impl PrefixHotspotSelector {
    pub fn new(alpha: f64, beta: f64, gamma: f64, hotspot_threshold: f64) -> Self {
        Self {
            alpha,
            beta,
            gamma,
            hotspot_threshold,
            window_size: 1000,
            max_prefix_length: 8,
            access_counter: 0,
            history: Vec::new(),
        }
    }

    pub fn with_window_size(mut self, window_size: u64) -> Self {
        self.window_size = window_size.max(1);
        self
    }

    pub fn with_max_prefix_length(mut self, max_prefix_length: usize) -> Self {
        self.max_prefix_length = max_prefix_length.max(MIN_PREFIX_LENGTH);
        self
    }

    /// Requests observed so far.
    pub fn access_counter(&self) -> u64 {
        self.access_counter
    }

    fn score(&self, request: &Request, node: &PrefillNode) -> f64 {
        let hit_ratio = cached_hit_ratio(request, node);
        let prefix = self.prefix_score(request, node);
        let load_score = 1.0 / (1.0 + node.queue_len() as f64 / LOAD_SCALE);
        self.alpha * hit_ratio + self.gamma * prefix + self.beta * load_score
    }

    /// Longest unbroken cached run from position 0, over all candidate
    /// prefix lengths, normalized by the maximum prefix length.
    ///
    /// For each length l the raw score is `(run / l) * l`, which collapses to
    /// the run itself; the per-length weighting therefore cancels out and
    /// only the longest run survives the maximum.
    fn prefix_score(&self, request: &Request, node: &PrefillNode) -> f64 {
        let max_len = self.max_prefix_length.min(request.hash_ids.len());
        if max_len < MIN_PREFIX_LENGTH {
            return 0.0;
        }
        let mut best_run = 0usize;
        for len in MIN_PREFIX_LENGTH..=max_len {
            let mut run = 0usize;
            for id in &request.hash_ids[..len] {
                if node.blocks.contains_key(id) {
                    run += 1;
                } else {
                    break;
                }
            }
            best_run = best_run.max(run);
        }
        best_run as f64 / self.max_prefix_length as f64
    }

    /// Record the selected node as the server of every candidate prefix of
    /// the request, refreshing windowed intensity.
    fn update_patterns(&self, request: &Request, selected: usize, nodes: &mut [PrefillNode]) {
        let max_len = self.max_prefix_length.min(request.hash_ids.len());
        if max_len < MIN_PREFIX_LENGTH {
            return;
        }
        let node_id = nodes[selected].id.clone();
        let access_counter = self.access_counter;
        let window_size = self.window_size;
        let metrics = nodes[selected].hotspot_metrics_mut();
        for len in MIN_PREFIX_LENGTH..=max_len {
            let prefix = &request.hash_ids[..len];
            let pattern = metrics
                .patterns
                .entry(prefix_key(prefix))
                .or_insert_with(|| PrefixPattern::new(prefix.to_vec()));
            pattern.record_hit(&node_id, access_counter, window_size);
        }
    }

    /// The detection and replication pass, run before scoring.
    ///
    /// Scans candidate prefix lengths from longest to shortest. For each, the
    /// node holding the most of the prefix's blocks gets its pattern's
    /// predictive analysis refreshed; a currently hot or predicted-hot
    /// pattern triggers replication of the prefix onto the least-loaded
    /// other nodes.
    fn detect_and_replicate(&mut self, request: &Request, nodes: &mut [PrefillNode]) {
        let max_len = self.max_prefix_length.min(request.hash_ids.len());
        if max_len < MIN_PREFIX_LENGTH || nodes.len() < 2 {
            return;
        }

        for len in (MIN_PREFIX_LENGTH..=max_len).rev() {
            let prefix = &request.hash_ids[..len];

            let mut source = 0usize;
            let mut held = 0usize;
            for (i, node) in nodes.iter().enumerate() {
                let count = prefix
                    .iter()
                    .filter(|id| node.blocks.contains_key(id))
                    .count();
                if count > held {
                    held = count;
                    source = i;
                }
            }
            if held == 0 {
                continue;
            }

            let key = prefix_key(prefix);
            let threshold = self.hotspot_threshold;
            let (intensity, slope, predicted) = {
                let metrics = nodes[source].hotspot_metrics_mut();
                let pattern = metrics
                    .patterns
                    .entry(key.clone())
                    .or_insert_with(|| PrefixPattern::new(prefix.to_vec()));
                pattern.update_prediction(threshold);
                (pattern.intensity, pattern.trend_slope, pattern.predicted_hot)
            };

            let current_hot = intensity > threshold;
            let predicted_hot = predicted && slope > PREDICTED_SLOPE_FLOOR;
            if !current_hot && !predicted_hot {
                continue;
            }

            let factor = if current_hot {
                reactive_replication_factor(intensity, nodes.len())
            } else {
                predictive_replication_factor(slope, intensity)
            };
            if factor <= 1 {
                continue;
            }

            self.replicate_prefix(prefix, &key, source, factor, intensity, current_hot, nodes);
        }
    }

    /// Copy the prefix's resident blocks from `source` onto the
    /// `factor - 1` lowest-loaded other nodes.
    #[allow(clippy::too_many_arguments)]
    fn replicate_prefix(
        &mut self,
        prefix: &[u64],
        key: &str,
        source: usize,
        factor: usize,
        intensity: f64,
        current_hot: bool,
        nodes: &mut [PrefillNode],
    ) {
        let block_ids: Vec<u64> = prefix
            .iter()
            .copied()
            .filter(|id| nodes[source].blocks.contains_key(id))
            .collect();
        if block_ids.is_empty() {
            return;
        }

        let mut candidates: Vec<usize> = (0..nodes.len()).filter(|&i| i != source).collect();
        candidates.sort_by(|&a, &b| {
            composite_load(&nodes[a]).total_cmp(&composite_load(&nodes[b]))
        });
        let targets: Vec<usize> = candidates.into_iter().take(factor - 1).collect();
        if targets.is_empty() {
            return;
        }

        let source_id = nodes[source].id.clone();
        for &target in &targets {
            let mut copied = Vec::new();
            for &hash_id in &block_ids {
                if nodes[target].blocks.contains_key(&hash_id) {
                    continue;
                }
                nodes[target].admit_block(hash_id);
                copied.push(hash_id);
                if nodes[target].block_count() > nodes[target].max_cache_blocks {
                    let _ = nodes[target].evict_one();
                }
            }
            // A target that already holds every block needs no record.
            if copied.is_empty() {
                continue;
            }
            let record = MigrationRecord {
                request_seq: self.access_counter,
                source: source_id.clone(),
                target: nodes[target].id.clone(),
                block_ids: copied,
                prefix_key: Some(key.to_string()),
                reason: if current_hot {
                    format!("hot prefix replicated at intensity {:.3}", intensity)
                } else {
                    "predicted-hot prefix pre-positioned".to_string()
                },
                intensity: Some(intensity),
            };
            debug!(
                source = %record.source,
                target = %record.target,
                prefix = %key,
                blocks = record.block_ids.len(),
                intensity,
                "replicated prefix"
            );
            nodes[source].hotspot_metrics_mut().migration_log.push(record.clone());
            self.history.push(record);
        }
        nodes[source]
            .hotspot_metrics_mut()
            .replication
            .insert(key.to_string(), factor as u32);
    }
}

/// Replication factor for a currently hot prefix: the hotter the intensity,
/// the more copies, capped so at least one node stays copy free.
fn reactive_replication_factor(intensity: f64, cluster_size: usize) -> usize {
    let bonus = if intensity >= 0.5 {
        3
    } else if intensity >= 0.2 {
        2
    } else if intensity >= 0.1 {
        1
    } else {
        0
    };
    (1 + bonus).min(cluster_size.saturating_sub(1).max(1))
}

/// Replication factor for a predicted-hot prefix, driven by trend slope and
/// current intensity.
fn predictive_replication_factor(slope: f64, intensity: f64) -> usize {
    let bonus = if slope >= 0.2 && intensity >= 0.05 {
        2
    } else if slope >= 0.1 && intensity >= 0.03 {
        1
    } else if slope >= 0.05 {
        1
    } else {
        0
    };
    1 + bonus
}

/// Queue pressure plus cache fullness, for target ordering.
fn composite_load(node: &PrefillNode) -> f64 {
    let cache_fill = if node.max_cache_blocks > 0 {
        node.block_count() as f64 / node.max_cache_blocks as f64
    } else {
        0.0
    };
    node.queue_len() as f64 + cache_fill
}

impl NodeSelector for PrefixHotspotSelector {
    fn select(&mut self, request: &Request, nodes: &mut [PrefillNode]) -> Option<usize> {
        if nodes.is_empty() {
            return None;
        }

        self.access_counter += 1;

        // Attach hot-spot metrics on first sight of each node.
        for node in nodes.iter_mut() {
            node.hotspot_metrics_mut();
        }

        self.detect_and_replicate(request, nodes);

        let best = index_of_best(nodes, |_, node| self.score(request, node));
        self.update_patterns(request, best, nodes);
        Some(best)
    }

    fn name(&self) -> &'static str {
        "prefix_hotspot"
    }

    fn migration_history(&self) -> &[MigrationRecord] {
        &self.history
    }
}
