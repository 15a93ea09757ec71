//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize all subsystems in dependency order
//! - Start background tasks (health scheduler, control server, config watcher)
//! - Bind listeners and begin accepting traffic
//! - Apply hot-reloaded configuration
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::backend_api::BackendError;
use crate::config::watcher::ConfigWatcher;
use crate::config::BalancerConfig;
use crate::control::ControlServer;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::{shutdown::Shutdown, signals};
use crate::load_balancer::backend::ServerInstance;
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to build backend client: {0}")]
    Client(#[from] BackendError),

    #[error("Failed to bind HTTP listener on {address}: {source}")]
    HttpBind {
        address: String,
        source: std::io::Error,
    },

    #[error("Control listener: {0}")]
    Control(#[from] ListenerError),

    #[error("Invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("HTTP server failed: {0}")]
    Serve(std::io::Error),
}

/// Build, start and serve everything until a stop signal arrives.
pub async fn run(config: BalancerConfig, config_path: Option<PathBuf>) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr);
    }

    let state = AppState::from_config(config.clone())?;
    let shutdown = Shutdown::new();
    let mut tasks = Vec::new();

    tracing::info!(
        algorithm = %state.balancer().algorithm(),
        backends = state.registry.len(),
        "Balancer initialized"
    );

    // Health scheduler
    {
        let monitor = state.monitor.clone();
        let signal = shutdown.subscribe();
        tasks.push(tokio::spawn(async move { monitor.run(signal).await }));
    }

    // Control plane
    if config.control.enabled {
        let listener = Listener::bind(&config.control.bind_address, config.control.max_connections).await?;
        let server = Arc::new(ControlServer::new(state.client.clone(), config.control.clone()));
        let signal = shutdown.subscribe();
        tasks.push(tokio::spawn(server.run(listener, signal)));
    } else {
        tracing::info!("Control server disabled");
    }

    // Config hot reload
    let _watcher = match config_path.as_deref() {
        Some(path) => spawn_reload(path, state.clone(), &shutdown, &mut tasks),
        None => None,
    };

    // HTTP listener last
    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::HttpBind {
            address: config.listener.bind_address.clone(),
            source,
        })?;

    let stopper = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        tracing::info!("Shutdown signal received");
        stopper.trigger();
    });

    let served = HttpServer::new(state)
        .run(listener, shutdown.subscribe())
        .await;

    // HTTP may also stop on its own error; everything else follows it down
    shutdown.trigger();
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Background task failed");
        }
    }

    served.map_err(StartupError::Serve)?;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn spawn_reload(
    path: &Path,
    state: AppState,
    shutdown: &Shutdown,
    tasks: &mut Vec<tokio::task::JoinHandle<()>>,
) -> Option<notify::RecommendedWatcher> {
    let (watcher, updates) = ConfigWatcher::new(path);
    match watcher.run() {
        Ok(handle) => {
            let signal = shutdown.subscribe();
            tasks.push(tokio::spawn(apply_updates(state, updates, signal)));
            Some(handle)
        }
        Err(e) => {
            tracing::error!(error = %e, path = ?path, "Failed to start config watcher, hot reload disabled");
            None
        }
    }
}

async fn apply_updates(
    state: AppState,
    mut updates: mpsc::UnboundedReceiver<BalancerConfig>,
    mut shutdown: crate::lifecycle::shutdown::ShutdownSignal,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(config) => apply_config(&state, config),
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}

/// Apply a reloaded configuration: switch the algorithm and reconcile the backend set.
///
/// Backends whose address or weight changed are re-registered with fresh counters.
/// Listener, timeout and health settings need a restart.
pub fn apply_config(state: &AppState, config: BalancerConfig) {
    state.balancer().set_algorithm(&config.algorithm);

    for existing in state.registry.list_all() {
        if !config.backends.iter().any(|b| b.id == existing.id) {
            state.registry.unregister(&existing.id);
            state.health.remove(&existing.id);
        }
    }

    for backend in &config.backends {
        let unchanged = state.registry.get(&backend.id).is_some_and(|current| {
            current.host == backend.host
                && current.port == backend.port
                && current.weight == backend.weight.max(1)
        });
        if unchanged {
            continue;
        }
        match ServerInstance::from_config(backend) {
            Some(instance) => {
                state.health.remove(&backend.id);
                state.registry.register(instance);
            }
            None => tracing::warn!(server_id = %backend.id, "Invalid backend address in reloaded config"),
        }
    }

    tracing::info!(
        algorithm = %state.balancer().algorithm(),
        backends = state.registry.len(),
        "Configuration reloaded"
    );
    state.config.store(Arc::new(config));
}
