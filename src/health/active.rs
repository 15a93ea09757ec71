//! Active health checking.
//!
//! # Responsibilities
//! - Probe every registered backend: liveness, then operational status
//! - Write a fresh snapshot per backend and mirror the verdict into the registry
//! - Drive cycles on a fixed cadence until shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::Mutex;
use tokio::time::{self, MissedTickBehavior};

use crate::backend_api::BackendClient;
use crate::config::HealthCheckConfig;
use crate::health::state::{HealthCache, HealthSnapshot};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::load_balancer::{Registry, backend::ServerInstance};
use crate::observability::metrics;

pub struct HealthMonitor {
    registry: Arc<Registry>,
    cache: Arc<HealthCache>,
    client: BackendClient,
    config: HealthCheckConfig,
    /// Held for the duration of a cycle so cycles never overlap.
    cycle: Mutex<()>,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<Registry>,
        cache: Arc<HealthCache>,
        client: BackendClient,
        config: HealthCheckConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            client,
            config,
            cycle: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &Arc<HealthCache> {
        &self.cache
    }

    /// Scheduler loop. The first cycle runs immediately. Shutdown is observed only
    /// between cycles, so a started cycle always completes.
    pub async fn run(&self, mut shutdown: ShutdownSignal) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            liveness = %self.config.liveness_path,
            status = %self.config.status_path,
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// One probe pass over every registered backend. Backends are probed
    /// concurrently, each bounded by the per-probe timeout.
    pub async fn run_cycle(&self) -> Vec<HealthSnapshot> {
        let _cycle = self.cycle.lock().await;
        let servers = self.registry.list_all();
        tracing::debug!(servers = servers.len(), "Starting health cycle");

        let snapshots = join_all(servers.iter().map(|server| self.check_server(server))).await;

        let healthy = snapshots.iter().filter(|s| s.is_available()).count();
        tracing::debug!(healthy, total = snapshots.len(), "Health cycle complete");
        snapshots
    }

    /// Live probe of one backend by id. Unknown ids yield a not-found snapshot
    /// that is not cached.
    pub async fn check_server_by_id(&self, id: &str) -> HealthSnapshot {
        match self.registry.get(id) {
            Some(server) => self.check_server(&server).await,
            None => HealthSnapshot::not_found(id),
        }
    }

    /// Probe one backend and record the result.
    pub async fn check_server(&self, server: &Arc<ServerInstance>) -> HealthSnapshot {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let base_url = server.url();
        let started = Instant::now();
        let mut snapshot = HealthSnapshot::new(&server.id, &base_url);

        match self
            .client
            .liveness(&base_url, &self.config.liveness_path, timeout)
            .await
        {
            Ok(status) if status.is_success() => {
                snapshot.healthy = true;
                snapshot.response_time_ms = elapsed_ms(started);

                match self
                    .client
                    .operational_status(&base_url, &self.config.status_path, timeout)
                    .await
                {
                    Ok(operational) => snapshot.server_open = operational.open,
                    Err(e) => {
                        tracing::warn!(server_id = %server.id, error = %e, "Failed to get server status");
                        snapshot.error_message = Some(format!("Status probe failed: {e}"));
                    }
                }
            }
            Ok(status) => {
                snapshot.response_time_ms = elapsed_ms(started);
                snapshot.error_message = Some(format!("Liveness probe returned {status}"));
                tracing::warn!(server_id = %server.id, status = %status, "Health check failed: non-success status");
            }
            Err(e) if e.is_timeout() => {
                snapshot.response_time_ms = elapsed_ms(started);
                snapshot.error_message =
                    Some(format!("Liveness check timed out after {}ms", self.config.timeout_ms));
                tracing::warn!(server_id = %server.id, timeout_ms = self.config.timeout_ms, "Health check timed out");
            }
            Err(e) => {
                snapshot.response_time_ms = elapsed_ms(started);
                snapshot.error_message = Some(e.to_string());
                tracing::warn!(server_id = %server.id, error = %e, "Health check failed");
            }
        }

        snapshot.current_connections = server.connections();
        snapshot.cpu_usage = server.cpu_usage();
        snapshot.memory_usage = server.memory_usage();
        snapshot.last_checked = Utc::now();

        // only the instance that was checked may write; an id removed or
        // re-registered meanwhile keeps no stale verdict
        let current = self
            .registry
            .get(&server.id)
            .is_some_and(|registered| Arc::ptr_eq(&registered, server));
        if current {
            self.cache.update(snapshot.clone());
            self.registry.update_health(&server.id, snapshot.is_available());
        }
        metrics::record_backend_health(&server.id, snapshot.is_available());

        tracing::debug!(
            server_id = %server.id,
            healthy = snapshot.healthy,
            open = snapshot.server_open,
            response_time_ms = snapshot.response_time_ms,
            "Health check"
        );
        snapshot
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(registry: Arc<Registry>) -> HealthMonitor {
        let config = HealthCheckConfig {
            timeout_ms: 300,
            ..HealthCheckConfig::default()
        };
        HealthMonitor::new(
            registry,
            Arc::new(HealthCache::new()),
            BackendClient::new().unwrap(),
            config,
        )
    }

    #[tokio::test]
    async fn unknown_id_is_reported_but_not_cached() {
        let m = monitor(Arc::new(Registry::new()));
        let snapshot = m.check_server_by_id("ghost").await;
        assert!(!snapshot.healthy);
        assert_eq!(snapshot.error_message.as_deref(), Some("Server not found"));
        assert!(m.cache().is_empty());
    }

    #[tokio::test]
    async fn unreachable_backend_is_marked_unhealthy_with_message() {
        let registry = Arc::new(Registry::new());
        registry.register(ServerInstance::new("dead", "127.0.0.1", 9, 1).unwrap());
        registry.update_health("dead", true);
        let m = monitor(registry.clone());

        let snapshots = m.run_cycle().await;
        assert_eq!(snapshots.len(), 1);
        assert!(!snapshots[0].healthy);
        assert!(!snapshots[0].server_open);
        assert!(snapshots[0].error_message.is_some());

        assert!(!m.cache().is_available("dead"));
        assert!(!registry.get("dead").unwrap().is_healthy());
    }

    #[tokio::test]
    async fn replaced_instance_does_not_write_its_verdict() {
        let registry = Arc::new(Registry::new());
        registry.register(ServerInstance::new("a", "127.0.0.1", 9, 1).unwrap());
        let old = registry.get("a").unwrap();
        registry.register(ServerInstance::new("a", "127.0.0.1", 10, 1).unwrap());
        let m = monitor(registry.clone());

        let snapshot = m.check_server(&old).await;
        assert_eq!(snapshot.server_id, "a");
        assert!(m.cache().get("a").is_none());

        // the registered instance still writes
        let current = registry.get("a").unwrap();
        m.check_server(&current).await;
        assert!(m.cache().get("a").is_some());
    }

    #[tokio::test]
    async fn disabled_monitor_returns_immediately() {
        let config = HealthCheckConfig {
            enabled: false,
            ..HealthCheckConfig::default()
        };
        let m = HealthMonitor::new(
            Arc::new(Registry::new()),
            Arc::new(HealthCache::new()),
            BackendClient::new().unwrap(),
            config,
        );
        let shutdown = crate::lifecycle::Shutdown::new();
        tokio::time::timeout(Duration::from_millis(100), m.run(shutdown.subscribe()))
            .await
            .unwrap();
    }
}
