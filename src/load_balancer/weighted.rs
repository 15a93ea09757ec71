//! Weighted random load balancing strategy.

use std::sync::Arc;
use rand::Rng;
use crate::load_balancer::{LoadBalancer, backend::ServerInstance};

/// Picks a backend with probability `weight / total_weight`.
#[derive(Debug, Default)]
pub struct Weighted;

impl Weighted {
    pub fn new() -> Self {
        Self
    }

    /// Walk cumulative weights and return the first backend whose running sum exceeds `draw`.
    fn pick(backends: &[Arc<ServerInstance>], draw: u64) -> Option<Arc<ServerInstance>> {
        let mut cumulative = 0u64;
        for backend in backends {
            cumulative += u64::from(backend.weight.max(1));
            if draw < cumulative {
                return Some(backend.clone());
            }
        }
        backends.first().cloned()
    }
}

impl LoadBalancer for Weighted {
    fn next_server(&self, backends: &[Arc<ServerInstance>]) -> Option<Arc<ServerInstance>> {
        if backends.is_empty() {
            return None;
        }

        let total: u64 = backends.iter().map(|b| u64::from(b.weight.max(1))).sum();
        let draw = rand::thread_rng().gen_range(0..total);
        Self::pick(backends, draw)
    }
}
