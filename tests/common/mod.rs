//! Shared utilities for integration testing.
//!
//! `MockBackend` speaks the backend contract (liveness, operational status,
//! packet processing, metrics, open/close) on an ephemeral port. Its behavior
//! is switched at runtime through atomics.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use compute_balancer::config::{BackendConfig, BalancerConfig};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Debug)]
pub struct MockState {
    pub alive: AtomicBool,
    pub open: AtomicBool,
    /// When set, the packet endpoint answers 500.
    pub fail_packets: AtomicBool,
    /// Delay before answering liveness, metrics and packet requests.
    pub delay_ms: AtomicU64,
    pub packets: AtomicUsize,
    pub admin_calls: AtomicUsize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            alive: AtomicBool::new(true),
            open: AtomicBool::new(true),
            fail_packets: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            packets: AtomicUsize::new(0),
            admin_calls: AtomicUsize::new(0),
        }
    }
}

pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn backend_config(&self, id: &str) -> BackendConfig {
        BackendConfig {
            id: id.to_string(),
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            weight: 1,
        }
    }

    pub fn set_alive(&self, alive: bool) {
        self.state.alive.store(alive, Ordering::SeqCst);
    }

    pub fn set_open(&self, open: bool) {
        self.state.open.store(open, Ordering::SeqCst);
    }

    pub fn set_fail_packets(&self, fail: bool) {
        self.state.fail_packets.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn packets(&self) -> usize {
        self.state.packets.load(Ordering::SeqCst)
    }
}

/// Start a mock backend on an ephemeral localhost port.
pub async fn spawn_backend() -> MockBackend {
    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route("/api/v1/health", get(liveness))
        .route("/api/v1/server/status", get(status))
        .route("/api/v1/fakePacket", post(packet))
        .route("/server/health", get(metrics))
        .route("/server/open", post(open))
        .route("/server/close", post(close))
        .route("/echo/{*rest}", any(echo))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockBackend { addr, state }
}

/// A localhost address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Configuration pointing at the given backends, with background tasks off.
pub fn config_for(backends: &[(&str, &MockBackend)]) -> BalancerConfig {
    let mut config = BalancerConfig::default();
    config.backends = backends
        .iter()
        .map(|(id, backend)| backend.backend_config(id))
        .collect();
    config.health_check.enabled = false;
    config.health_check.timeout_ms = 1000;
    config.control.server_urls = backends.iter().map(|(_, b)| b.url()).collect();
    config.control.request_timeout_ms = 1000;
    config.dispatch.proxy_timeout_secs = 2;
    config.dispatch.packet_timeout_secs = 2;
    config
}

/// Applies the configured response delay.
async fn stall(state: &MockState) {
    let delay = state.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}

async fn liveness(State(state): State<Arc<MockState>>) -> StatusCode {
    stall(&state).await;
    if state.alive.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn status(State(state): State<Arc<MockState>>) -> Json<Value> {
    Json(json!({ "open": state.open.load(Ordering::SeqCst) }))
}

async fn packet(State(state): State<Arc<MockState>>, Json(job): Json<Value>) -> Response {
    stall(&state).await;
    state.packets.fetch_add(1, Ordering::SeqCst);

    if state.fail_packets.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }

    Json(json!({
        "status": "SUCCESS",
        "processingTimeMs": job["processingTimeMs"],
        "cpuCycles": 1234,
        "memoryUsedBytes": 4096,
        "result": format!("processed {}", job["packetId"].as_str().unwrap_or("?")),
    }))
    .into_response()
}

async fn metrics(State(state): State<Arc<MockState>>) -> Json<Value> {
    stall(&state).await;
    Json(json!({
        "cpuUsagePercent": 12.5,
        "memoryUsagePercent": 40.0,
        "avgProcessingTimeSec": 0.25,
        "currConnections": 3,
        "isOpen": state.open.load(Ordering::SeqCst),
    }))
}

async fn open(State(state): State<Arc<MockState>>) -> StatusCode {
    state.admin_calls.fetch_add(1, Ordering::SeqCst);
    state.open.store(true, Ordering::SeqCst);
    StatusCode::OK
}

async fn close(State(state): State<Arc<MockState>>) -> StatusCode {
    state.admin_calls.fetch_add(1, Ordering::SeqCst);
    state.open.store(false, Ordering::SeqCst);
    StatusCode::OK
}

async fn echo(headers: HeaderMap, body: Bytes) -> Response {
    let forwarded_by = headers
        .get("x-forwarded-by")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    (
        StatusCode::ACCEPTED,
        [("x-echo-forwarded-by", forwarded_by)],
        body,
    )
        .into_response()
}
