//! Statistics aggregation and report formatting for simulation runs.

use prefillsim_routing::{MigrationRecord, PrefillNode};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-node accounting, accumulated during a run and finalized at the end.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeStats {
    pub node_id: String,
    pub total_requests: u64,
    pub total_hits: u64,
    pub total_misses: u64,
    pub hit_rate: f64,
    /// Blocks evicted under memory pressure.
    pub evicted_blocks: u64,
    /// Times eviction produced no victim while pressure persisted.
    pub eviction_stalls: u64,
}

impl NodeStats {
    /// Recompute the hit rate from the counters.
    pub fn finalize(&mut self) {
        let total = self.total_hits + self.total_misses;
        self.hit_rate = if total > 0 {
            self.total_hits as f64 / total as f64
        } else {
            0.0
        };
    }
}

/// Aggregated statistics for an entire run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationStats {
    /// Selector name.
    pub selector: String,
    /// Requests processed.
    pub total_requests: u64,
    /// Block-level cache hits across all nodes.
    pub total_hits: u64,
    /// Block-level cache misses across all nodes.
    pub total_misses: u64,
    /// `hits / (hits + misses)`.
    pub hit_rate: f64,
    /// Per-node breakdown, keyed by node ID.
    pub node_stats: BTreeMap<String, NodeStats>,
}

/// Full output of one run: aggregate statistics plus the migration history
/// for migrating selectors (empty otherwise).
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub stats: SimulationStats,
    pub migrations: Vec<MigrationRecord>,
}

/// Largest single-node share of the cluster's resident blocks, in [0, 1].
pub fn peak_concentration(nodes: &[PrefillNode]) -> f64 {
    let total: usize = nodes.iter().map(|n| n.block_count()).sum();
    if total == 0 {
        return 0.0;
    }
    let max = nodes.iter().map(|n| n.block_count()).max().unwrap_or(0);
    max as f64 / total as f64
}

/// Format a run report as a human-readable table.
pub fn format_table(report: &RunReport) -> String {
    let stats = &report.stats;
    let mut out = String::new();
    out.push_str(&format!(
        "\n{:=<64}\n",
        format!("  {} Results  ", stats.selector)
    ));
    out.push_str(&format!(
        "  Requests: {}  Hits: {}  Misses: {}  Hit rate: {:.2}%\n",
        stats.total_requests,
        stats.total_hits,
        stats.total_misses,
        stats.hit_rate * 100.0,
    ));
    if !stats.node_stats.is_empty() {
        out.push_str(&format!("{:-<64}\n", "  Nodes  "));
        for node in stats.node_stats.values() {
            out.push_str(&format!(
                "  {:<10} requests={:<7} hit_rate={:>6.2}% evicted={:<6} stalls={}\n",
                node.node_id,
                node.total_requests,
                node.hit_rate * 100.0,
                node.evicted_blocks,
                node.eviction_stalls,
            ));
        }
    }
    if !report.migrations.is_empty() {
        out.push_str(&format!("{:-<64}\n", "  Migrations  "));
        out.push_str(&format!("  Total: {}\n", report.migrations.len()));
        for record in report.migrations.iter().take(10) {
            out.push_str(&format!(
                "  #{}: {} -> {}, {} blocks ({})\n",
                record.request_seq,
                record.source,
                record.target,
                record.block_ids.len(),
                record.reason,
            ));
        }
        if report.migrations.len() > 10 {
            out.push_str(&format!(
                "  ... {} more\n",
                report.migrations.len() - 10
            ));
        }
    }
    out.push_str(&format!("{:=<64}\n", ""));
    out
}

/// Format a comparison table of multiple run reports.
pub fn format_comparison_table(reports: &[RunReport]) -> String {
    if reports.is_empty() {
        return String::from("No results to compare.\n");
    }

    let mut out = String::new();
    out.push_str(&format!("\n{:=<72}\n", "  Selector Comparison  "));
    out.push_str(&format!(
        "{:<26} {:>10} {:>10} {:>10} {:>10}\n",
        "Selector", "Requests", "Hit rate", "Evicted", "Migrations"
    ));
    out.push_str(&format!("{:-<72}\n", ""));
    for report in reports {
        let evicted: u64 = report
            .stats
            .node_stats
            .values()
            .map(|n| n.evicted_blocks)
            .sum();
        out.push_str(&format!(
            "{:<26} {:>10} {:>9.2}% {:>10} {:>10}\n",
            report.stats.selector,
            report.stats.total_requests,
            report.stats.hit_rate * 100.0,
            evicted,
            report.migrations.len(),
        ));
    }
    out.push_str(&format!("{:=<72}\n", ""));
    out
}
