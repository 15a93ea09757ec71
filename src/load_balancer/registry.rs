//! Backend registry.
//!
//! Canonical store of backend instances keyed by id. Pure state, no policy:
//! the registry never decides availability.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::BackendConfig;
use crate::load_balancer::backend::ServerInstance;

/// Thread-safe map of backend id → instance.
#[derive(Debug, Default)]
pub struct Registry {
    servers: DashMap<String, Arc<ServerInstance>>,
    next_seq: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configured backends. Invalid entries are skipped with a warning.
    pub fn from_config(configs: &[BackendConfig]) -> Self {
        let registry = Self::new();
        for config in configs {
            match ServerInstance::from_config(config) {
                Some(instance) => registry.register(instance),
                None => tracing::warn!(server_id = %config.id, host = %config.host, "Invalid backend address"),
            }
        }
        registry
    }

    /// Insert or replace a backend. A replaced backend starts with fresh counters.
    pub fn register(&self, mut instance: ServerInstance) {
        instance.seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let id = instance.id.clone();
        tracing::info!(server_id = %id, url = %instance.url(), weight = instance.weight, "Registered server");
        self.servers.insert(id, Arc::new(instance));
    }

    /// Remove a backend. Returns the removed instance, if any.
    pub fn unregister(&self, id: &str) -> Option<Arc<ServerInstance>> {
        let removed = self.servers.remove(id).map(|(_, instance)| instance);
        if removed.is_some() {
            tracing::info!(server_id = %id, "Unregistered server");
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<Arc<ServerInstance>> {
        self.servers.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.servers.contains_key(id)
    }

    /// All backends in registration order.
    pub fn list_all(&self) -> Vec<Arc<ServerInstance>> {
        let mut all: Vec<Arc<ServerInstance>> =
            self.servers.iter().map(|entry| entry.value().clone()).collect();
        all.sort_by_key(|s| s.seq);
        all
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Count of backends whose reporting mirror is healthy.
    pub fn healthy_count(&self) -> usize {
        self.servers.iter().filter(|entry| entry.value().is_healthy()).count()
    }

    pub fn increment_connections(&self, id: &str) -> bool {
        match self.get(id) {
            Some(server) => {
                server.inc_connections();
                true
            }
            None => false,
        }
    }

    /// Decrement, flooring at zero even under mismatched calls.
    pub fn decrement_connections(&self, id: &str) -> bool {
        match self.get(id) {
            Some(server) => {
                server.dec_connections();
                true
            }
            None => false,
        }
    }

    /// Set the reporting mirror of the health verdict.
    pub fn update_health(&self, id: &str, healthy: bool) -> bool {
        match self.get(id) {
            Some(server) => {
                server.set_healthy(healthy);
                tracing::debug!(server_id = %id, healthy, "Updated server health");
                true
            }
            None => false,
        }
    }

    pub fn update_metrics(&self, id: &str, connections: usize, cpu: f64, memory: f64) -> bool {
        match self.get(id) {
            Some(server) => {
                server.set_connections(connections);
                server.set_usage(cpu, memory);
                tracing::debug!(server_id = %id, connections, cpu, memory, "Updated server metrics");
                true
            }
            None => false,
        }
    }
}
