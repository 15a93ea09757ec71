//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server instance
//! - Track active connections (exact under concurrent dispatch)
//! - Hold the reporting mirror of the health state and usage gauges
//!
//! The `healthy` flag here is a denormalized copy for status reports. Selection
//! reads availability from the health cache only.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use url::Url;

use crate::config::BackendConfig;
use crate::observability::metrics;

/// A single backend server.
#[derive(Debug)]
pub struct ServerInstance {
    /// Unique identifier.
    pub id: String,
    /// Host name or IP.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Selection weight, always >= 1.
    pub weight: u32,
    /// Pre-calculated base URL.
    pub base_url: Url,
    /// Registration sequence, used for stable iteration order.
    pub(crate) seq: u64,

    healthy: AtomicBool,
    connections: AtomicUsize,
    /// f64 bit patterns.
    cpu_usage: AtomicU64,
    memory_usage: AtomicU64,
}

impl ServerInstance {
    /// Create a new instance. Returns `None` if `host:port` does not form a valid URL.
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16, weight: u32) -> Option<Self> {
        let host = host.into();
        let base_url = Url::parse(&format!("http://{}:{}", host, port)).ok()?;
        Some(Self {
            id: id.into(),
            host,
            port,
            weight: weight.max(1),
            base_url,
            seq: 0,
            healthy: AtomicBool::new(false),
            connections: AtomicUsize::new(0),
            cpu_usage: AtomicU64::new(0f64.to_bits()),
            memory_usage: AtomicU64::new(0f64.to_bits()),
        })
    }

    /// Build from a configuration entry.
    pub fn from_config(config: &BackendConfig) -> Option<Self> {
        Self::new(&config.id, &config.host, config.port, config.weight)
    }

    /// Base URL without trailing slash, e.g. `http://localhost:8081`.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Current number of in-flight dispatches.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::Acquire)
    }

    /// Increment active connection count.
    pub fn inc_connections(&self) {
        let now = self.connections.fetch_add(1, Ordering::AcqRel) + 1;
        metrics::record_backend_connections(&self.id, now);
    }

    /// Decrement active connection count, flooring at zero.
    pub fn dec_connections(&self) {
        let prev = self
            .connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some(c.saturating_sub(1)))
            .unwrap_or(0);
        metrics::record_backend_connections(&self.id, prev.saturating_sub(1));
    }

    /// Overwrite the connection count (administrative metrics update).
    pub fn set_connections(&self, connections: usize) {
        self.connections.store(connections, Ordering::Release);
    }

    /// Reporting mirror of the last health verdict.
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Release);
    }

    pub fn cpu_usage(&self) -> f64 {
        f64::from_bits(self.cpu_usage.load(Ordering::Relaxed))
    }

    pub fn memory_usage(&self) -> f64 {
        f64::from_bits(self.memory_usage.load(Ordering::Relaxed))
    }

    pub fn set_usage(&self, cpu: f64, memory: f64) {
        self.cpu_usage.store(cpu.to_bits(), Ordering::Relaxed);
        self.memory_usage.store(memory.to_bits(), Ordering::Relaxed);
    }

    /// Take a scoped connection slot. The count is released when the guard drops.
    pub fn acquire(self: &Arc<Self>) -> BackendConnectionGuard {
        self.inc_connections();
        BackendConnectionGuard {
            backend: self.clone(),
        }
    }

    /// Point-in-time view for reporting.
    pub fn view(&self) -> ServerView {
        ServerView {
            id: self.id.clone(),
            host: self.host.clone(),
            port: self.port,
            url: self.url(),
            weight: self.weight,
            healthy: self.is_healthy(),
            current_connections: self.connections(),
            cpu_usage: self.cpu_usage(),
            memory_usage: self.memory_usage(),
        }
    }
}

/// Serializable snapshot of a [`ServerInstance`].
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerView {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub url: String,
    pub weight: u32,
    pub healthy: bool,
    pub current_connections: usize,
    pub cpu_usage: f64,
    pub memory_usage: f64,
}

/// A RAII guard that manages the active connection count.
///
/// Dropping it (normal return, error, or a cancelled future) decrements exactly once.
#[derive(Debug)]
pub struct BackendConnectionGuard {
    backend: Arc<ServerInstance>,
}

impl BackendConnectionGuard {
    pub fn backend(&self) -> &Arc<ServerInstance> {
        &self.backend
    }
}

impl Deref for BackendConnectionGuard {
    type Target = ServerInstance;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for BackendConnectionGuard {
    fn drop(&mut self) {
        self.backend.dec_connections();
    }
}
