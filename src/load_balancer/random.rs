//! Uniform random load balancing strategy.

use std::sync::Arc;
use rand::Rng;
use crate::load_balancer::{LoadBalancer, backend::ServerInstance};

#[derive(Debug, Default)]
pub struct RandomChoice;

impl RandomChoice {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for RandomChoice {
    fn next_server(&self, backends: &[Arc<ServerInstance>]) -> Option<Arc<ServerInstance>> {
        if backends.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..backends.len());
        backends.get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn picks_only_from_candidates_and_covers_them() {
        let lb = RandomChoice::new();
        let backends: Vec<_> = (0..3)
            .map(|i| Arc::new(ServerInstance::new(format!("r{i}"), "127.0.0.1", 8080 + i, 1).unwrap()))
            .collect();

        let mut seen = HashSet::new();
        for _ in 0..500 {
            let picked = lb.next_server(&backends).unwrap();
            assert!(backends.iter().any(|b| b.id == picked.id));
            seen.insert(picked.id.clone());
        }
        assert_eq!(seen.len(), 3);
    }
}
