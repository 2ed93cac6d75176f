//! Uniform random node selection.
//!
//! The baseline policy: every node is equally likely, regardless of cache
//! contents or load. Seeded so runs are reproducible.

use crate::traits::*;
use crate::node::PrefillNode;
use crate::request::Request;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Uniform random selector.
pub struct RandomSelector {
    rng: ChaCha8Rng,
}

impl RandomSelector {
    pub fn new() -> Self {
        Self::with_seed(42)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeSelector for RandomSelector {
    fn select(&mut self, _request: &Request, nodes: &mut [PrefillNode]) -> Option<usize> {
        if nodes.is_empty() {
            return None;
        }
        Some(self.rng.gen_range(0..nodes.len()))
    }

    fn name(&self) -> &'static str {
        "random"
    }
}
