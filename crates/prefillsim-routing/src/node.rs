//! Block and prefill-node data model.
//!
//! A [`PrefillNode`] owns a bounded KV cache (a map from block hash ID to
//! [`Block`]), a bounded request queue that acts as the node's load proxy,
//! hit/miss accounting, and an attached eviction policy. All ordering in the
//! model is expressed through a per-node monotonic sequence counter rather
//! than wall-clock time, so runs are fully reproducible.

use crate::eviction::EvictionPolicy;
use crate::prefix_patterns::HotspotMetrics;
use crate::request::Request;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// Tokens covered by one KV-cache block.
pub const BLOCK_SIZE_TOKENS: u32 = 512;

/// Modeled memory footprint of one block in MB: 512 tokens, K and V planes,
/// 4 bytes per element.
pub const BLOCK_MEMORY_MB: f64 = BLOCK_SIZE_TOKENS as f64 * 2.0 * 4.0 / (1024.0 * 1024.0);

/// Request-queue cap; older entries are truncated so the queue stays a
/// bounded proxy for recent load.
pub const MAX_QUEUE_LEN: usize = 100;

/// A single cached KV chunk.
#[derive(Debug, Clone, Serialize)]
pub struct Block {
    /// Content hash identifying this chunk.
    pub hash_id: u64,
    /// Chunk size in tokens.
    pub size_tokens: u32,
    /// Accesses since admission (starts at 1).
    pub hit_count: u64,
    /// Node sequence number of the most recent access.
    pub access_seq: u64,
    /// Node sequence number at admission.
    pub create_seq: u64,
    /// Reference count, used by hot-spot accounting.
    pub ref_count: u32,
}

/// One prefill worker's cache, queue, and accounting state.
#[derive(Debug)]
pub struct PrefillNode {
    /// Stable node identifier (e.g. `node-0`).
    pub id: String,
    /// Resident blocks keyed by hash ID.
    pub blocks: HashMap<u64, Block>,
    /// Recent requests routed here; length is the load proxy.
    pub queue: VecDeque<Request>,
    /// Cache capacity in blocks.
    pub max_cache_blocks: usize,
    /// Modeled memory budget in MB.
    pub max_memory_mb: f64,
    /// Modeled memory in use in MB.
    pub used_memory_mb: f64,
    /// Cumulative block-level cache hits.
    pub total_hits: u64,
    /// Cumulative block-level cache misses.
    pub total_misses: u64,
    /// Attached eviction policy; its auxiliary state mirrors `blocks`.
    pub eviction: Box<dyn EvictionPolicy>,
    /// Modeled network bandwidth in GB/s for transfer-cost estimates.
    pub network_bandwidth_gbps: f64,
    /// Hot-spot metrics, attached lazily by prefix-aware selectors.
    pub hotspot_metrics: Option<HotspotMetrics>,
    /// Monotonic sequence counter standing in for timestamps.
    seq_counter: u64,
}

impl PrefillNode {
    /// Create an empty node with the given capacity limits and policy.
    pub fn new(
        id: impl Into<String>,
        max_cache_blocks: usize,
        max_memory_mb: f64,
        network_bandwidth_gbps: f64,
        eviction: Box<dyn EvictionPolicy>,
    ) -> Self {
        Self {
            id: id.into(),
            blocks: HashMap::new(),
            queue: VecDeque::new(),
            max_cache_blocks,
            max_memory_mb,
            used_memory_mb: 0.0,
            total_hits: 0,
            total_misses: 0,
            eviction,
            network_bandwidth_gbps,
            hotspot_metrics: None,
            seq_counter: 0,
        }
    }

    /// Advance and return the node's sequence counter. Strictly monotonic.
    pub fn next_seq(&mut self) -> u64 {
        self.seq_counter += 1;
        self.seq_counter
    }

    /// Current sequence counter value.
    pub fn current_seq(&self) -> u64 {
        self.seq_counter
    }

    /// Number of resident blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Current queue length (the load proxy).
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Append a request to the queue, truncating the oldest entries so the
    /// queue never exceeds [`MAX_QUEUE_LEN`].
    pub fn enqueue(&mut self, request: Request) {
        self.queue.push_back(request);
        while self.queue.len() > MAX_QUEUE_LEN {
            self.queue.pop_front();
        }
    }

    /// Admit a freshly stamped block: hit count 1, create/access sequence
    /// numbers from this node's counter, memory accounted, policy notified.
    ///
    /// Used on cache misses and as the target side of a migration (migrated
    /// copies always arrive as fresh blocks).
    pub fn admit_block(&mut self, hash_id: u64) {
        let seq = self.next_seq();
        self.blocks.insert(
            hash_id,
            Block {
                hash_id,
                size_tokens: BLOCK_SIZE_TOKENS,
                hit_count: 1,
                access_seq: seq,
                create_seq: seq,
                ref_count: 0,
            },
        );
        self.used_memory_mb += BLOCK_MEMORY_MB;
        self.eviction.on_add(hash_id);
    }

    /// Refresh a resident block on a cache hit: bump the access sequence and
    /// let the policy update its bookkeeping (which also increments the
    /// block's hit counter). Returns false when the block is not resident.
    pub fn touch_block(&mut self, hash_id: u64) -> bool {
        let seq = self.seq_counter + 1;
        match self.blocks.get_mut(&hash_id) {
            Some(block) => {
                self.seq_counter = seq;
                block.access_seq = seq;
                self.eviction.on_access(block);
                true
            }
            None => false,
        }
    }

    /// Remove a block outside the eviction path (migration source removal).
    /// Keeps the policy's auxiliary state in sync with the block map.
    pub fn remove_block(&mut self, hash_id: u64) -> Option<Block> {
        let block = self.blocks.remove(&hash_id)?;
        self.used_memory_mb = (self.used_memory_mb - BLOCK_MEMORY_MB).max(0.0);
        self.eviction.on_remove(hash_id);
        Some(block)
    }

    /// Ask the attached policy for a victim and drop it from the cache.
    /// Returns the victim's hash ID, or `None` when the policy has no victim.
    pub fn evict_one(&mut self) -> Option<u64> {
        let victim = self.eviction.evict(&self.blocks)?;
        self.blocks.remove(&victim);
        self.used_memory_mb = (self.used_memory_mb - BLOCK_MEMORY_MB).max(0.0);
        Some(victim)
    }

    /// Hot-spot metrics record, attached on first use.
    pub fn hotspot_metrics_mut(&mut self) -> &mut HotspotMetrics {
        self.hotspot_metrics.get_or_insert_with(HotspotMetrics::default)
    }

    /// Whether the eviction auxiliary state mirrors the block map exactly.
    pub fn aux_consistent(&self) -> bool {
        self.eviction.len() == self.blocks.len()
            && self.blocks.keys().all(|id| self.eviction.contains(*id))
    }
}
