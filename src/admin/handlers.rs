//! Administrative REST handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dispatch::{PacketRequest, PacketResult};
use crate::health::HealthSnapshot;
use crate::http::server::AppState;
use crate::load_balancer::{Algorithm, ServerView, backend::ServerInstance};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub total_servers: usize,
    pub healthy_servers: usize,
    pub unhealthy_servers: usize,
    pub total_requests_processed: u64,
    pub total_requests_failed: u64,
    pub current_algorithm: Algorithm,
    pub servers: Vec<HealthSnapshot>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessResponse {
    pub status: &'static str,
    pub total_servers: usize,
    pub healthy_servers: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub algorithm: Algorithm,
    pub total_servers: usize,
    pub health_check_interval: String,
    pub health_check_interval_secs: u64,
    pub control_port: Option<u16>,
    pub max_connections_per_backend: usize,
}

#[derive(Debug, Deserialize)]
pub struct AlgorithmQuery {
    pub algorithm: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmChanged {
    pub message: &'static str,
    pub algorithm: String,
    pub effective_algorithm: Algorithm,
}

#[derive(Debug, Deserialize)]
pub struct RegisterServer {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub weight: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: message.into() })).into_response()
}

pub async fn forward_packet(
    State(state): State<AppState>,
    Json(request): Json<PacketRequest>,
) -> Json<PacketResult> {
    tracing::info!(packet_id = ?request.packet_id, "Forwarding packet");
    Json(state.packets.forward(request).await)
}

pub async fn forward_batch(
    State(state): State<AppState>,
    Json(requests): Json<Vec<PacketRequest>>,
) -> Json<Vec<PacketResult>> {
    Json(state.packets.forward_batch(requests).await)
}

/// Live probe of one backend.
pub async fn server_health(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<HealthSnapshot> {
    Json(state.monitor.check_server_by_id(&id).await)
}

/// Run one live cycle over every backend.
pub async fn all_server_healths(State(state): State<AppState>) -> Json<Vec<HealthSnapshot>> {
    Json(state.monitor.run_cycle().await)
}

pub async fn cached_server_healths(State(state): State<AppState>) -> Json<Vec<HealthSnapshot>> {
    Json(state.health.all())
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let total = state.registry.len();
    let healthy = state.registry.healthy_count();
    let balancer = state.balancer();

    Json(StatusResponse {
        total_servers: total,
        healthy_servers: healthy,
        unhealthy_servers: total.saturating_sub(healthy),
        total_requests_processed: balancer.processed(),
        total_requests_failed: balancer.failed(),
        current_algorithm: balancer.algorithm(),
        servers: state.health.all(),
        timestamp: Utc::now(),
    })
}

pub async fn liveness(State(state): State<AppState>) -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "UP",
        total_servers: state.registry.len(),
        healthy_servers: state.registry.healthy_count(),
        timestamp: Utc::now(),
    })
}

pub async fn set_algorithm(
    State(state): State<AppState>,
    Query(query): Query<AlgorithmQuery>,
) -> Json<AlgorithmChanged> {
    let effective = state.balancer().set_algorithm(&query.algorithm);
    Json(AlgorithmChanged {
        message: "Algorithm changed successfully",
        algorithm: query.algorithm,
        effective_algorithm: effective,
    })
}

pub async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let config = state.config.load();
    let interval = config.health_check.interval_secs;
    Json(ConfigResponse {
        algorithm: state.balancer().algorithm(),
        total_servers: state.registry.len(),
        health_check_interval: format!("{interval} seconds"),
        health_check_interval_secs: interval,
        control_port: config.control.port(),
        max_connections_per_backend: state.selector.max_connections(),
    })
}

pub async fn list_servers(State(state): State<AppState>) -> Json<Vec<ServerView>> {
    Json(state.registry.list_all().iter().map(|s| s.view()).collect())
}

pub async fn register_server(
    State(state): State<AppState>,
    Json(body): Json<RegisterServer>,
) -> Response {
    if body.id.trim().is_empty() {
        return error(StatusCode::BAD_REQUEST, "Server id must not be empty");
    }
    if body.host.trim().is_empty() || body.port == 0 {
        return error(StatusCode::BAD_REQUEST, "Server host and port are required");
    }
    if body.weight == Some(0) {
        return error(StatusCode::BAD_REQUEST, "Server weight must be at least 1");
    }

    let Some(instance) = ServerInstance::new(&body.id, &body.host, body.port, body.weight.unwrap_or(1))
    else {
        return error(
            StatusCode::BAD_REQUEST,
            format!("Invalid server address {}:{}", body.host, body.port),
        );
    };

    // a replaced backend must earn availability again
    state.health.remove(&body.id);
    state.registry.register(instance);

    match state.registry.get(&body.id) {
        Some(server) => {
            let monitor = state.monitor.clone();
            let probe_target = server.clone();
            tokio::spawn(async move {
                monitor.check_server(&probe_target).await;
            });
            (StatusCode::CREATED, Json(server.view())).into_response()
        }
        None => error(StatusCode::CONFLICT, "Server was removed concurrently"),
    }
}

pub async fn unregister_server(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.registry.unregister(&id) {
        Some(server) => {
            state.health.remove(&id);
            Json(server.view()).into_response()
        }
        None => error(StatusCode::NOT_FOUND, format!("Server '{id}' not found")),
    }
}

pub async fn not_found() -> Response {
    error(StatusCode::NOT_FOUND, "Unknown admin endpoint")
}
