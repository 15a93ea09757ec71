//! Least Connections load balancing strategy.

use std::sync::Arc;
use crate::load_balancer::{LoadBalancer, backend::ServerInstance};

/// Least connections selector.
/// Selects the backend with the minimum number of active connections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn next_server(&self, backends: &[Arc<ServerInstance>]) -> Option<Arc<ServerInstance>> {
        // min_by_key keeps the first of equal elements, so ties go to the
        // earliest entry in iteration order
        backends
            .iter()
            .min_by_key(|b| b.connections())
            .cloned()
    }
}
