//! Node selection policy trait definitions.
//!
//! All selection policies implement [`NodeSelector`], receiving the incoming
//! request and the full node list. Migrating selectors get mutable access
//! because selection may relocate blocks and attach hot-spot metrics as a
//! side effect; stateless selectors simply ignore the mutability.

use crate::node::PrefillNode;
use crate::request::Request;
use serde::Serialize;

/// Record of one block relocation performed by a migrating selector.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationRecord {
    /// Value of the selector's request counter when the migration ran.
    pub request_seq: u64,
    /// Source node ID.
    pub source: String,
    /// Target node ID.
    pub target: String,
    /// Hash IDs moved or copied.
    pub block_ids: Vec<u64>,
    /// Canonical prefix key, set for prefix-driven replication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix_key: Option<String>,
    /// Human-readable trigger description.
    pub reason: String,
    /// Observed prefix intensity at migration time, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
}

/// The core node selection trait.
///
/// Implement this to create custom routing strategies. The processor calls
/// [`NodeSelector::select`] once per incoming request.
pub trait NodeSelector: Send {
    /// Pick the node that should serve `request`, as an index into `nodes`.
    /// Returns `None` when the node list is empty.
    fn select(&mut self, request: &Request, nodes: &mut [PrefillNode]) -> Option<usize>;

    /// Selector name for reports.
    fn name(&self) -> &'static str;

    /// Relocations performed so far. Empty for non-migrating selectors.
    fn migration_history(&self) -> &[MigrationRecord] {
        &[]
    }
}

/// Number of the request's blocks already resident on `node`.
pub fn cached_hit_count(request: &Request, node: &PrefillNode) -> usize {
    request
        .hash_ids
        .iter()
        .filter(|id| node.blocks.contains_key(id))
        .count()
}

/// Fraction of the request's blocks already resident on `node`, in [0, 1].
pub fn cached_hit_ratio(request: &Request, node: &PrefillNode) -> f64 {
    if request.hash_ids.is_empty() {
        return 0.0;
    }
    cached_hit_count(request, node) as f64 / request.hash_ids.len() as f64
}

/// Index of the highest-scoring node; the first node wins ties.
///
/// Callers guarantee `nodes` is non-empty.
pub(crate) fn index_of_best<F>(nodes: &[PrefillNode], mut score: F) -> usize
where
    F: FnMut(usize, &PrefillNode) -> f64,
{
    let mut best = 0;
    let mut best_score = score(0, &nodes[0]);
    for (i, node) in nodes.iter().enumerate().skip(1) {
        let s = score(i, node);
        if s > best_score {
            best_score = s;
            best = i;
        }
    }
    best
}
