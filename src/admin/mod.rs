//! Administrative REST surface, nested under `/api/lb`.

pub mod handlers;

use axum::{
    routing::{delete, get, post},
    Router,
};

use self::handlers::*;
use crate::http::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/forward", post(forward_packet))
        .route("/forward/batch", post(forward_batch))
        .route("/server/health/{id}", get(server_health))
        .route("/server/healths", get(all_server_healths))
        .route("/server/healths/cached", get(cached_server_healths))
        .route("/status", get(get_status))
        .route("/health", get(liveness))
        .route("/config/algorithm", post(set_algorithm))
        .route("/config", get(get_config))
        .route("/servers", get(list_servers).post(register_server))
        .route("/servers/{id}", delete(unregister_server))
        .fallback(not_found)
}
