//! Pluggable cache eviction policies: FIFO, LRU, and LFU.
//!
//! Each policy keeps its own auxiliary ordering state keyed by block hash ID.
//! The owning node calls [`EvictionPolicy::on_add`] / [`EvictionPolicy::on_remove`]
//! whenever it mutates its block map, so the auxiliary state is always an
//! exact mirror of the map. There is no shared ownership between the two
//! sides; a plain integer key links them.
//!
//! All three policies support O(1) add, access update, and victim selection.
//! FIFO and LRU share a map-backed doubly linked list; LFU layers frequency
//! buckets of such lists under a lazily advanced `min_freq` pointer.

use crate::node::Block;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Bound on the `min_freq` advance scan in LFU, so a sparse frequency space
/// can never turn victim selection into an unbounded walk.
const MIN_FREQ_SCAN_CEILING: u64 = 1000;

/// Cache eviction policy over a node's block set.
pub trait EvictionPolicy: fmt::Debug + Send {
    /// Called after a block is inserted into the node's map.
    fn on_add(&mut self, block_id: u64);

    /// Called after every cache hit. Increments the block's hit counter and
    /// updates any recency/frequency bookkeeping.
    fn on_access(&mut self, block: &mut Block);

    /// Called when the node removes a block outside the eviction path
    /// (e.g. migration source removal).
    fn on_remove(&mut self, block_id: u64);

    /// Select a victim and remove it from this policy's own state. The caller
    /// removes the victim from the block map. Returns `None` when no victim
    /// is available.
    ///
    /// A candidate found in the auxiliary state but absent from `blocks` is a
    /// stale entry; it is dropped and selection retries.
    fn evict(&mut self, blocks: &HashMap<u64, Block>) -> Option<u64>;

    /// Policy name for reports.
    fn name(&self) -> &'static str;

    /// Number of blocks tracked in the auxiliary state.
    fn len(&self) -> usize;

    /// Whether the auxiliary state is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the auxiliary state tracks the given block.
    fn contains(&self, block_id: u64) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct Links {
    prev: Option<u64>,
    next: Option<u64>,
}

/// Doubly linked list over block IDs backed by a hash map, giving O(1)
/// push/unlink/pop at the cost of one map lookup per link hop.
#[derive(Debug, Default)]
struct LinkedOrder {
    head: Option<u64>,
    tail: Option<u64>,
    links: HashMap<u64, Links>,
}

impl LinkedOrder {
    fn len(&self) -> usize {
        self.links.len()
    }

    fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    fn contains(&self, id: u64) -> bool {
        self.links.contains_key(&id)
    }

    fn push_back(&mut self, id: u64) {
        self.links.insert(id, Links { prev: self.tail, next: None });
        match self.tail {
            Some(tail) => {
                if let Some(links) = self.links.get_mut(&tail) {
                    links.next = Some(id);
                }
            }
            None => self.head = Some(id),
        }
        self.tail = Some(id);
    }

    fn push_front(&mut self, id: u64) {
        self.links.insert(id, Links { prev: None, next: self.head });
        match self.head {
            Some(head) => {
                if let Some(links) = self.links.get_mut(&head) {
                    links.prev = Some(id);
                }
            }
            None => self.tail = Some(id),
        }
        self.head = Some(id);
    }

    /// Remove `id` from the list. Returns false if it was not present.
    fn unlink(&mut self, id: u64) -> bool {
        let Some(Links { prev, next }) = self.links.remove(&id) else {
            return false;
        };
        match prev {
            Some(p) => {
                if let Some(links) = self.links.get_mut(&p) {
                    links.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(links) = self.links.get_mut(&n) {
                    links.prev = prev;
                }
            }
            None => self.tail = prev,
        }
        true
    }

    fn move_to_front(&mut self, id: u64) {
        if self.unlink(id) {
            self.push_front(id);
        }
    }

    fn pop_front(&mut self) -> Option<u64> {
        let id = self.head?;
        self.unlink(id);
        Some(id)
    }

    fn pop_back(&mut self) -> Option<u64> {
        let id = self.tail?;
        self.unlink(id);
        Some(id)
    }
}

/// First-in-first-out eviction. Access order is ignored; only admission
/// order matters.
#[derive(Debug, Default)]
pub struct FifoEviction {
    order: LinkedOrder,
}

impl FifoEviction {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EvictionPolicy for FifoEviction {
    fn on_add(&mut self, block_id: u64) {
        self.order.push_back(block_id);
    }

    fn on_access(&mut self, block: &mut Block) {
        // FIFO never reorders on access.
        block.hit_count += 1;
    }

    fn on_remove(&mut self, block_id: u64) {
        self.order.unlink(block_id);
    }

    fn evict(&mut self, blocks: &HashMap<u64, Block>) -> Option<u64> {
        while let Some(id) = self.order.pop_front() {
            if blocks.contains_key(&id) {
                return Some(id);
            }
            debug!(block_id = id, policy = "fifo", "dropped stale eviction entry");
        }
        None
    }

    fn name(&self) -> &'static str {
        "fifo"
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn contains(&self, block_id: u64) -> bool {
        self.order.contains(block_id)
    }
}

/// Least-recently-used eviction. The list head is the most recent access;
/// victims come from the tail.
#[derive(Debug, Default)]
pub struct LruEviction {
    order: LinkedOrder,
}

impl LruEviction {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EvictionPolicy for LruEviction {
    fn on_add(&mut self, block_id: u64) {
        self.order.push_front(block_id);
    }

    fn on_access(&mut self, block: &mut Block) {
        block.hit_count += 1;
        self.order.move_to_front(block.hash_id);
    }

    fn on_remove(&mut self, block_id: u64) {
        self.order.unlink(block_id);
    }

    fn evict(&mut self, blocks: &HashMap<u64, Block>) -> Option<u64> {
        while let Some(id) = self.order.pop_back() {
            if blocks.contains_key(&id) {
                return Some(id);
            }
            debug!(block_id = id, policy = "lru", "dropped stale eviction entry");
        }
        None
    }

    fn name(&self) -> &'static str {
        "lru"
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn contains(&self, block_id: u64) -> bool {
        self.order.contains(block_id)
    }
}

/// Least-frequently-used eviction with FIFO tie-break inside a frequency
/// level.
///
/// Blocks live in per-frequency insertion-ordered lists. `min_freq` points at
/// the lowest populated level and is advanced lazily when its bucket drains.
#[derive(Debug)]
pub struct LfuEviction {
    buckets: HashMap<u64, LinkedOrder>,
    freqs: HashMap<u64, u64>,
    min_freq: u64,
}

impl LfuEviction {
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            freqs: HashMap::new(),
            min_freq: 1,
        }
    }

    /// Scan upward for the next populated frequency level, bounded by
    /// [`MIN_FREQ_SCAN_CEILING`]. Falls back to level 1 when the scan runs
    /// off the ceiling.
    fn advance_min_freq(&mut self) {
        self.min_freq += 1;
        while self
            .buckets
            .get(&self.min_freq)
            .map_or(true, |bucket| bucket.is_empty())
        {
            self.min_freq += 1;
            if self.min_freq > MIN_FREQ_SCAN_CEILING {
                self.min_freq = 1;
                break;
            }
        }
    }
}

impl Default for LfuEviction {
    fn default() -> Self {
        Self::new()
    }
}

impl EvictionPolicy for LfuEviction {
    fn on_add(&mut self, block_id: u64) {
        self.buckets.entry(1).or_default().push_back(block_id);
        self.freqs.insert(block_id, 1);
        self.min_freq = 1;
    }

    fn on_access(&mut self, block: &mut Block) {
        let block_id = block.hash_id;
        block.hit_count += 1;

        let old_freq = self.freqs.get(&block_id).copied().unwrap_or(0);
        let new_freq = old_freq + 1;

        if old_freq > 0 {
            if let Some(bucket) = self.buckets.get_mut(&old_freq) {
                bucket.unlink(block_id);
            }
        }
        self.buckets.entry(new_freq).or_default().push_back(block_id);
        self.freqs.insert(block_id, new_freq);

        let old_drained = self
            .buckets
            .get(&old_freq)
            .map_or(true, |bucket| bucket.is_empty());
        if old_freq == self.min_freq && old_drained {
            self.min_freq = new_freq;
        }
    }

    fn on_remove(&mut self, block_id: u64) {
        if let Some(freq) = self.freqs.remove(&block_id) {
            if let Some(bucket) = self.buckets.get_mut(&freq) {
                bucket.unlink(block_id);
            }
        }
    }

    fn evict(&mut self, blocks: &HashMap<u64, Block>) -> Option<u64> {
        loop {
            if self.freqs.is_empty() {
                return None;
            }
            if self
                .buckets
                .get(&self.min_freq)
                .map_or(true, |bucket| bucket.is_empty())
            {
                self.advance_min_freq();
            }
            let bucket = self.buckets.get_mut(&self.min_freq)?;
            let id = bucket.pop_front()?;
            self.freqs.remove(&id);
            if blocks.contains_key(&id) {
                return Some(id);
            }
            debug!(block_id = id, policy = "lfu", "dropped stale eviction entry");
        }
    }

    fn name(&self) -> &'static str {
        "lfu"
    }

    fn len(&self) -> usize {
        self.freqs.len()
    }

    fn contains(&self, block_id: u64) -> bool {
        self.freqs.contains_key(&block_id)
    }
}
