//! Server selection.
//!
//! # Responsibilities
//! - Compute the available set: health snapshot says healthy and open, and the
//!   connection count is below the ceiling
//! - Dispatch to the active strategy
//! - Resolve explicitly targeted backends
//!
//! Availability is read from the [`HealthCache`] only, never from the registry's
//! reporting mirror.

use std::sync::Arc;

use thiserror::Error;

use crate::health::state::HealthCache;
use crate::load_balancer::{
    LoadBalancer,
    algorithm::Algorithm,
    backend::ServerInstance,
    least_conn::LeastConnections,
    random::RandomChoice,
    registry::Registry,
    round_robin::RoundRobin,
    state::BalancerState,
    weighted::Weighted,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("No healthy server available")]
    NoServerAvailable,

    #[error("Server '{0}' not found or unavailable")]
    ServerNotFound(String),
}

/// Picks one backend per request under the active algorithm.
#[derive(Debug)]
pub struct SelectionEngine {
    registry: Arc<Registry>,
    health: Arc<HealthCache>,
    state: Arc<BalancerState>,
    max_connections: usize,
    round_robin: RoundRobin,
    least_conn: LeastConnections,
    weighted: Weighted,
    random: RandomChoice,
}

impl SelectionEngine {
    pub fn new(
        registry: Arc<Registry>,
        health: Arc<HealthCache>,
        state: Arc<BalancerState>,
        max_connections: usize,
    ) -> Self {
        Self {
            registry,
            health,
            state,
            max_connections,
            round_robin: RoundRobin::new(),
            least_conn: LeastConnections::new(),
            weighted: Weighted::new(),
            random: RandomChoice::new(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn state(&self) -> &Arc<BalancerState> {
        &self.state
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    fn strategy(&self, algorithm: Algorithm) -> &dyn LoadBalancer {
        match algorithm {
            Algorithm::RoundRobin => &self.round_robin,
            Algorithm::LeastConnections => &self.least_conn,
            Algorithm::Weighted => &self.weighted,
            Algorithm::Random => &self.random,
        }
    }

    /// Availability invariant: healthy ∧ open ∧ under the connection ceiling.
    pub fn is_available(&self, server: &ServerInstance) -> bool {
        self.health.is_available(&server.id) && server.connections() < self.max_connections
    }

    /// Available backends in registry order.
    pub fn available_servers(&self) -> Vec<Arc<ServerInstance>> {
        self.registry
            .list_all()
            .into_iter()
            .filter(|s| self.is_available(s))
            .collect()
    }

    /// Select a backend with the active algorithm.
    pub fn select_server(&self) -> Result<Arc<ServerInstance>, SelectionError> {
        let algorithm = self.state.algorithm();
        let available = self.available_servers();

        if available.is_empty() {
            tracing::warn!("No available servers for load balancing");
            return Err(SelectionError::NoServerAvailable);
        }

        let selected = self
            .strategy(algorithm)
            .next_server(&available)
            .ok_or(SelectionError::NoServerAvailable)?;

        tracing::debug!(server_id = %selected.id, algorithm = %algorithm, "Selected server");
        Ok(selected)
    }

    /// Return a specific backend, only if it is currently available.
    pub fn select_server_by_id(&self, id: &str) -> Result<Arc<ServerInstance>, SelectionError> {
        self.registry
            .get(id)
            .filter(|s| self.is_available(s))
            .ok_or_else(|| SelectionError::ServerNotFound(id.to_string()))
    }

    /// Explicit target when given and non-empty, otherwise the pool algorithm.
    pub fn resolve(&self, target: Option<&str>) -> Result<Arc<ServerInstance>, SelectionError> {
        match target.map(str::trim).filter(|t| !t.is_empty()) {
            Some(id) => self.select_server_by_id(id),
            None => self.select_server(),
        }
    }
}
