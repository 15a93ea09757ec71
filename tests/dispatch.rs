//! Packet forwarding and proxying end to end.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use compute_balancer::dispatch::{PacketRequest, PacketStatus};
use compute_balancer::AppState;
use futures_util::future::join_all;

mod common;

fn request(id: &str) -> PacketRequest {
    PacketRequest {
        packet_id: Some(id.to_string()),
        processing_time_ms: Some(10),
        ..PacketRequest::default()
    }
}

#[tokio::test]
async fn packet_is_forwarded_with_backend_figures() {
    let backend = common::spawn_backend().await;
    let state = AppState::from_config(common::config_for(&[("a", &backend)])).unwrap();
    state.monitor.run_cycle().await;

    let result = state.packets.forward(request("p-1")).await;
    assert_eq!(result.status, PacketStatus::Success);
    assert_eq!(result.packet_id, "p-1");
    assert_eq!(result.target_server_id.as_deref(), Some("a"));
    assert_eq!(result.target_server_url, Some(backend.url()));
    assert_eq!(result.cpu_cycles, Some(1234));
    assert_eq!(result.memory_used_bytes, Some(4096));
    assert_eq!(result.result.as_deref(), Some("processed p-1"));
    assert_eq!(backend.packets(), 1);
    assert_eq!(state.balancer().processed(), 1);
}

#[tokio::test]
async fn missing_packet_id_is_generated() {
    let backend = common::spawn_backend().await;
    let state = AppState::from_config(common::config_for(&[("a", &backend)])).unwrap();
    state.monitor.run_cycle().await;

    let result = state.packets.forward(PacketRequest::default()).await;
    assert_eq!(result.status, PacketStatus::Success);
    assert!(uuid::Uuid::parse_str(&result.packet_id).is_ok());
}

#[tokio::test]
async fn no_available_backend_reports_no_server() {
    let backend = common::spawn_backend().await;
    backend.set_open(false);
    let state = AppState::from_config(common::config_for(&[("a", &backend)])).unwrap();
    state.monitor.run_cycle().await;

    let result = state.packets.forward(request("p-1")).await;
    assert_eq!(result.status, PacketStatus::NoServerAvailable);
    assert_eq!(result.error_message.as_deref(), Some("No healthy server available"));
    assert!(result.target_server_id.is_none());
    assert_eq!(backend.packets(), 0);
    assert_eq!(state.balancer().failed(), 1);
}

#[tokio::test]
async fn explicit_target_must_be_available() {
    let up = common::spawn_backend().await;
    let down = common::spawn_backend().await;
    down.set_alive(false);
    let state = AppState::from_config(common::config_for(&[("up", &up), ("down", &down)])).unwrap();
    state.monitor.run_cycle().await;

    let mut to_down = request("p-1");
    to_down.target_server_id = Some("down".into());
    assert_eq!(state.packets.forward(to_down).await.status, PacketStatus::NoServerAvailable);

    let mut to_up = request("p-2");
    to_up.target_server_id = Some("up".into());
    let result = state.packets.forward(to_up).await;
    assert_eq!(result.status, PacketStatus::Success);
    assert_eq!(result.target_server_id.as_deref(), Some("up"));
}

#[tokio::test]
async fn backend_error_status_marks_packet_failed() {
    let backend = common::spawn_backend().await;
    backend.set_fail_packets(true);
    let state = AppState::from_config(common::config_for(&[("a", &backend)])).unwrap();
    state.monitor.run_cycle().await;

    let result = state.packets.forward(request("p-1")).await;
    assert_eq!(result.status, PacketStatus::Failed);
    assert_eq!(result.target_server_id.as_deref(), Some("a"));
    assert!(result.error_message.is_some());
    assert_eq!(state.balancer().failed(), 1);
}

#[tokio::test]
async fn batch_keeps_input_order() {
    let backend = common::spawn_backend().await;
    let state = AppState::from_config(common::config_for(&[("a", &backend)])).unwrap();
    state.monitor.run_cycle().await;

    let ids = ["b-1", "b-2", "b-3"];
    let results = state
        .packets
        .forward_batch(ids.iter().map(|id| request(id)).collect())
        .await;
    let got: Vec<&str> = results.iter().map(|r| r.packet_id.as_str()).collect();
    assert_eq!(got, ids);
    assert!(results.iter().all(|r| r.status == PacketStatus::Success));
}

#[tokio::test]
async fn round_robin_spreads_packets() {
    let a = common::spawn_backend().await;
    let b = common::spawn_backend().await;
    let state = AppState::from_config(common::config_for(&[("a", &a), ("b", &b)])).unwrap();
    state.monitor.run_cycle().await;

    let mut targets = HashSet::new();
    for i in 0..4 {
        let result = state.packets.forward(request(&format!("p-{i}"))).await;
        targets.insert(result.target_server_id.unwrap());
    }
    assert_eq!(targets.len(), 2);
    assert_eq!(a.packets(), 2);
    assert_eq!(b.packets(), 2);
}

#[tokio::test]
async fn connection_counts_net_to_zero_under_concurrency() {
    let good = common::spawn_backend().await;
    good.set_delay(Duration::from_millis(20));
    let bad = common::spawn_backend().await;
    bad.set_fail_packets(true);

    let state = AppState::from_config(common::config_for(&[("good", &good), ("bad", &bad)])).unwrap();
    state.monitor.run_cycle().await;

    let packets = Arc::clone(&state.packets);
    let tasks = (0..40).map(|i| {
        let packets = packets.clone();
        async move { packets.forward(request(&format!("c-{i}"))).await }
    });
    let results = join_all(tasks).await;

    assert_eq!(results.len(), 40);
    for server in state.registry.list_all() {
        assert_eq!(server.connections(), 0, "server {} leaked connections", server.id);
    }
    let balancer = state.balancer();
    assert_eq!(balancer.processed() + balancer.failed(), 40);
}

#[tokio::test]
async fn proxy_forwards_verbatim_with_trace_header() {
    let backend = common::spawn_backend().await;
    let state = AppState::from_config(common::config_for(&[("a", &backend)])).unwrap();
    state.monitor.run_cycle().await;

    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static("text/plain"));
    let outcome = state
        .proxy
        .handle(Method::PUT, "/echo/x?y=1", &headers, Bytes::from_static(b"hello"))
        .await;

    assert_eq!(outcome.status, StatusCode::ACCEPTED);
    assert_eq!(outcome.body, Bytes::from_static(b"hello"));
    assert_eq!(outcome.backend.as_deref(), Some("a"));
    assert_eq!(
        outcome.headers.get("x-echo-forwarded-by").unwrap(),
        "compute-balancer"
    );
    assert_eq!(state.registry.get("a").unwrap().connections(), 0);
}

#[tokio::test]
async fn proxy_without_backend_is_503() {
    let state = AppState::from_config(common::config_for(&[])).unwrap();
    let outcome = state
        .proxy
        .handle(Method::GET, "/anything", &HeaderMap::new(), Bytes::new())
        .await;
    assert_eq!(outcome.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(state.balancer().failed(), 1);
}

#[tokio::test]
async fn proxy_transport_failure_is_502() {
    let backend = common::spawn_backend().await;
    let state = AppState::from_config(common::config_for(&[("a", &backend)])).unwrap();
    state.monitor.run_cycle().await;

    // re-point the available backend at a dead port, keeping its snapshot
    let dead = common::dead_address().await;
    state.registry.register(
        compute_balancer::load_balancer::backend::ServerInstance::new(
            "a",
            dead.ip().to_string(),
            dead.port(),
            1,
        )
        .unwrap(),
    );

    let outcome = state
        .proxy
        .handle(Method::GET, "/echo/x", &HeaderMap::new(), Bytes::new())
        .await;
    assert_eq!(outcome.status, StatusCode::BAD_GATEWAY);
    assert!(String::from_utf8_lossy(&outcome.body).starts_with("Proxy error:"));
    assert_eq!(state.registry.get("a").unwrap().connections(), 0);
}

#[tokio::test]
async fn cancelled_dispatch_releases_its_slot() {
    let backend = common::spawn_backend().await;
    let state = AppState::from_config(common::config_for(&[("a", &backend)])).unwrap();
    state.monitor.run_cycle().await;
    backend.set_delay(Duration::from_millis(500));

    let pending = state.packets.forward(request("slow"));
    assert!(tokio::time::timeout(Duration::from_millis(100), pending).await.is_err());
    assert_eq!(state.registry.get("a").unwrap().connections(), 0);

    let headers = json_headers();
    let pending = state
        .proxy
        .handle(Method::POST, "/api/v1/fakePacket", &headers, Bytes::from_static(b"{}"));
    assert!(tokio::time::timeout(Duration::from_millis(100), pending).await.is_err());
    assert_eq!(state.registry.get("a").unwrap().connections(), 0);

    // no outcome was recorded for either abandoned call
    assert_eq!(state.balancer().processed() + state.balancer().failed(), 0);
}

fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers
}
