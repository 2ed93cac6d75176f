//! Shortest-queue node selection.
//!
//! Routes each request to the node with the fewest queued requests. Load
//! aware but cache blind; ties go to the earliest node in input order.

use crate::node::PrefillNode;
use crate::request::Request;
use crate::traits::*;

/// Shortest-queue selector.
pub struct LoadBalancedSelector;

impl LoadBalancedSelector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoadBalancedSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeSelector for LoadBalancedSelector {
    fn select(&mut self, _request: &Request, nodes: &mut [PrefillNode]) -> Option<usize> {
        nodes
            .iter()
            .enumerate()
            .min_by_key(|(_, node)| node.queue_len())
            .map(|(i, _)| i)
    }

    fn name(&self) -> &'static str {
        "load_balanced"
    }
}
