//! Request model for the prefill router.
//!
//! A request is an ordered list of KV-cache block hash IDs plus arrival
//! metadata taken verbatim from the trace. Requests are immutable once
//! parsed; the router only reads them.

use serde::{Deserialize, Serialize};

/// A single prefill request flowing through the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Arrival timestamp in milliseconds.
    pub timestamp: u64,
    /// Prompt length in tokens.
    pub input_length: u32,
    /// Generation length in tokens.
    pub output_length: u32,
    /// Ordered hash IDs of the KV-cache blocks this request touches.
    pub hash_ids: Vec<u64>,
}

impl Request {
    /// Number of KV-cache blocks the request references.
    pub fn block_count(&self) -> usize {
        self.hash_ids.len()
    }
}
