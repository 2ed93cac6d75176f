//! Cache-affinity selection with global concentration awareness and periodic
//! block migration.
//!
//! Cache-affinity routing has a "rich get richer" failure mode: the node that
//! accumulates the most blocks wins ever more requests and concentrates the
//! whole working set. This selector counters it two ways:
//!
//! 1. A concentration penalty in the per-request score, pushing requests away
//!    from nodes that hold an outsized share of the cluster's blocks.
//! 2. Every `migration_interval` requests, a migration pass that moves the
//!    coldest 20% of an overloaded node's blocks to an underloaded node.
//!
//! The hottest blocks never move; relocating them would destroy exactly the
//! locality the affinity score is trying to exploit.

use crate::node::PrefillNode;
use crate::request::Request;
use crate::traits::*;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Queue length treated as one unit of load.
const LOAD_SCALE: f64 = 100.0;

/// Share of an overloaded node's blocks moved per migration, rounded up.
const MIGRATION_SHARE: f64 = 0.2;

/// Multiplier applied to concentration overshoot in the score penalty.
const CONCENTRATION_PENALTY_WEIGHT: f64 = 2.0;

/// Per-node concentration snapshot produced by the analysis pass.
#[derive(Debug, Clone)]
struct NodeConcentration {
    index: usize,
    block_count: usize,
    hot_block_count: usize,
    ratio: f64,
}

/// Cache-affinity selector with hot-spot migration.
pub struct HotspotMigrationSelector {
    /// Cache affinity weight.
    pub alpha: f64,
    /// Load balancing weight.
    pub beta: f64,
    /// Concentration ratio above which a node is overloaded.
    pub migration_threshold: f64,
    /// Fraction of all requests above which a block counts as hot.
    pub hotspot_threshold: f64,
    /// Requests between migration checks.
    pub migration_interval: u64,
    request_counter: u64,
    history: Vec<MigrationRecord>,
}

impl HotspotMigrationSelector {
    pub fn new(alpha: f64, beta: f64, migration_threshold: f64, hotspot_threshold: f64) -> Self {
        Self {
            alpha,
            beta,
            migration_threshold,
            hotspot_threshold,
            migration_interval: 100,
            request_counter: 0,
            history: Vec::new(),
        }
    }

    pub fn with_interval(mut self, migration_interval: u64) -> Self {
        self.migration_interval = migration_interval.max(1);
        self
    }

    /// Requests observed so far.
    pub fn request_counter(&self) -> u64 {
        self.request_counter
    }

    fn score(&self, request: &Request, node: &PrefillNode, concentration: f64) -> f64 {
        let hit_ratio = cached_hit_ratio(request, node);
        let load = node.queue_len() as f64 / LOAD_SCALE;
        let penalty =
            (concentration - self.migration_threshold).max(0.0) * CONCENTRATION_PENALTY_WEIGHT;
        self.alpha * hit_ratio - self.beta * load - penalty
    }

    /// Compute each node's block count, hot-block count, and share of the
    /// cluster's total blocks.
    fn analyze_concentration(&self, nodes: &[PrefillNode]) -> Vec<NodeConcentration> {
        let total_blocks: usize = nodes.iter().map(|n| n.block_count()).sum();

        // Global access frequency per block across the cluster.
        let mut global_hits: HashMap<u64, u64> = HashMap::new();
        for node in nodes {
            for (hash_id, block) in &node.blocks {
                *global_hits.entry(*hash_id).or_insert(0) += block.hit_count;
            }
        }
        let hot_blocks: HashSet<u64> = global_hits
            .iter()
            .filter(|(_, hits)| {
                self.request_counter > 0
                    && **hits as f64 / self.request_counter as f64 > self.hotspot_threshold
            })
            .map(|(id, _)| *id)
            .collect();

        nodes
            .iter()
            .enumerate()
            .map(|(index, node)| {
                let block_count = node.block_count();
                let hot_block_count = node
                    .blocks
                    .keys()
                    .filter(|id| hot_blocks.contains(id))
                    .count();
                let ratio = if total_blocks > 0 {
                    block_count as f64 / total_blocks as f64
                } else {
                    0.0
                };
                NodeConcentration {
                    index,
                    block_count,
                    hot_block_count,
                    ratio,
                }
            })
            .collect()
    }

    /// The periodic migration pass: classify nodes, pair overloaded with
    /// underloaded, and move the coldest blocks across.
    fn check_and_migrate(&mut self, nodes: &mut [PrefillNode]) {
        let concentrations = self.analyze_concentration(nodes);

        let mut overloaded: Vec<NodeConcentration> = concentrations
            .iter()
            .filter(|c| c.ratio > self.migration_threshold)
            .cloned()
            .collect();
        let mut underloaded: Vec<NodeConcentration> = concentrations
            .iter()
            .filter(|c| c.ratio < self.migration_threshold / 2.0)
            .cloned()
            .collect();

        if overloaded.is_empty() || underloaded.is_empty() {
            return;
        }

        overloaded.sort_by(|a, b| b.ratio.total_cmp(&a.ratio));
        underloaded.sort_by(|a, b| a.ratio.total_cmp(&b.ratio));

        for (i, over) in overloaded.iter().enumerate() {
            // The emptiest remaining target; the last one absorbs any excess
            // overloaded nodes.
            let under = &underloaded[i.min(underloaded.len() - 1)];
            let victims = coldest_blocks(&nodes[over.index], MIGRATION_SHARE);
            if victims.is_empty() {
                continue;
            }

            move_blocks(nodes, over.index, under.index, &victims);

            let record = MigrationRecord {
                request_seq: self.request_counter,
                source: nodes[over.index].id.clone(),
                target: nodes[under.index].id.clone(),
                block_ids: victims.clone(),
                prefix_key: None,
                reason: format!(
                    "concentration ratio {:.2} exceeded threshold {:.2}",
                    over.ratio, self.migration_threshold
                ),
                intensity: None,
            };
            info!(
                source = %record.source,
                target = %record.target,
                blocks = victims.len(),
                source_blocks = over.block_count,
                hot_blocks = over.hot_block_count,
                ratio = over.ratio,
                "relocated cold blocks off concentrated node"
            );
            self.history.push(record);
        }
    }
}

/// The `share` of a node's blocks with the lowest hit counts (at least one).
/// Ties resolve by hash ID so the pick is deterministic.
fn coldest_blocks(node: &PrefillNode, share: f64) -> Vec<u64> {
    if node.blocks.is_empty() {
        return Vec::new();
    }
    let mut by_hits: Vec<(u64, u64)> = node
        .blocks
        .values()
        .map(|block| (block.hit_count, block.hash_id))
        .collect();
    by_hits.sort_unstable();
    let count = ((by_hits.len() as f64 * share).ceil() as usize)
        .max(1)
        .min(by_hits.len());
    by_hits.into_iter().take(count).map(|(_, id)| id).collect()
}

/// Move blocks from `src` to `dst`. Each block leaves the source's map and
/// eviction state and enters the target as a freshly stamped block. A target
/// pushed over its block capacity sheds one victim through its own policy.
fn move_blocks(nodes: &mut [PrefillNode], src: usize, dst: usize, block_ids: &[u64]) {
    for &hash_id in block_ids {
        if nodes[src].remove_block(hash_id).is_none() {
            continue;
        }
        let target = &mut nodes[dst];
        target.admit_block(hash_id);
        if target.block_count() > target.max_cache_blocks && target.evict_one().is_none() {
            warn!(
                node = %target.id,
                "migration target over capacity but eviction produced no victim"
            );
        }
    }
}

impl NodeSelector for HotspotMigrationSelector {
    fn select(&mut self, request: &Request, nodes: &mut [PrefillNode]) -> Option<usize> {
        if nodes.is_empty() {
            return None;
        }

        self.request_counter += 1;
        if self.request_counter % self.migration_interval == 0 {
            self.check_and_migrate(nodes);
        }

        let concentrations = self.analyze_concentration(nodes);
        Some(index_of_best(nodes, |i, node| {
            self.score(request, node, concentrations[i].ratio)
        }))
    }

    fn name(&self) -> &'static str {
        "hotspot_migration"
    }

    fn migration_history(&self) -> &[MigrationRecord] {
        &self.history
    }
}
