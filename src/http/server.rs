//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared component graph ([`AppState`])
//! - Create the Axum router: admin API under `/api/lb`, proxy fallback for everything else
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Serve until shutdown

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::backend_api::{BackendClient, BackendError};
use crate::config::BalancerConfig;
use crate::dispatch::{PacketForwarder, ProxyDispatcher};
use crate::health::{HealthCache, HealthMonitor};
use crate::http::request::RequestIdExt;
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::load_balancer::{Algorithm, BalancerState, Registry, SelectionEngine};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Current configuration snapshot, swapped on reload.
    pub config: Arc<ArcSwap<BalancerConfig>>,
    pub registry: Arc<Registry>,
    pub health: Arc<HealthCache>,
    pub monitor: Arc<HealthMonitor>,
    pub selector: Arc<SelectionEngine>,
    pub proxy: Arc<ProxyDispatcher>,
    pub packets: Arc<PacketForwarder>,
    pub client: BackendClient,
}

impl AppState {
    /// Build every core component from one configuration.
    pub fn from_config(config: BalancerConfig) -> Result<Self, BackendError> {
        let client = BackendClient::new()?;
        let registry = Arc::new(Registry::from_config(&config.backends));
        let health = Arc::new(HealthCache::new());
        let balancer = Arc::new(BalancerState::new(Algorithm::from_name(&config.algorithm)));

        let selector = Arc::new(SelectionEngine::new(
            registry.clone(),
            health.clone(),
            balancer,
            config.dispatch.max_connections_per_backend,
        ));
        let monitor = Arc::new(HealthMonitor::new(
            registry.clone(),
            health.clone(),
            client.clone(),
            config.health_check.clone(),
        ));
        let proxy = Arc::new(ProxyDispatcher::new(selector.clone(), &config.dispatch));
        let packets = Arc::new(PacketForwarder::new(selector.clone(), client.clone(), &config.dispatch));

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            registry,
            health,
            monitor,
            selector,
            proxy,
            packets,
            client,
        })
    }

    /// Algorithm and lifetime counters.
    pub fn balancer(&self) -> &Arc<BalancerState> {
        self.selector.state()
    }
}

/// HTTP server for the balancer.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(state: AppState) -> Router {
        let config = state.config.load_full();

        Router::new()
            .nest("/api/lb", admin::router())
            .fallback(proxy_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.listener.request_timeout_secs,
                    ))),
            )
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server on the given listener until shutdown.
    pub async fn run(self, listener: TcpListener, mut shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Proxy handler for every path outside the admin prefix.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let full_path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let request_id = parts.headers.request_id();

    tracing::info!(
        request_id = %request_id,
        method = %parts.method,
        path = %full_path,
        "Proxying request"
    );

    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    state
        .proxy
        .handle(parts.method.clone(), full_path, &parts.headers, body)
        .await
        .into_response()
}
