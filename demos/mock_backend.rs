//! A stand-in compute backend for local runs.
//!
//! `cargo run --example mock_backend -- --port 8081`

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Parser)]
struct Args {
    #[arg(long, default_value_t = 8081)]
    port: u16,
}

#[derive(Default)]
struct Backend {
    closed: AtomicBool,
    active: AtomicI64,
    jobs: AtomicU64,
    busy_ms: AtomicU64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    packet_id: String,
    cpu_intensity: u32,
    ram_intensity: u32,
    processing_time_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();
    let backend = Arc::new(Backend::default());

    let app = Router::new()
        .route("/api/v1/health", get(|| async { StatusCode::OK }))
        .route("/api/v1/server/status", get(status))
        .route("/api/v1/fakePacket", post(process))
        .route("/server/health", get(metrics))
        .route("/server/open", post(open))
        .route("/server/close", post(close))
        .with_state(backend);

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Mock backend listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn status(State(backend): State<Arc<Backend>>) -> Json<Value> {
    Json(json!({ "open": !backend.closed.load(Ordering::Relaxed) }))
}

async fn process(State(backend): State<Arc<Backend>>, Json(job): Json<Job>) -> Json<Value> {
    backend.active.fetch_add(1, Ordering::Relaxed);
    let started = Instant::now();

    // approximate load: intensity stretches the requested time a little
    let factor = 1.0 + (job.cpu_intensity + job.ram_intensity) as f64 / 100.0;
    tokio::time::sleep(Duration::from_millis((job.processing_time_ms as f64 * factor) as u64)).await;

    let elapsed = started.elapsed().as_millis() as u64;
    backend.active.fetch_sub(1, Ordering::Relaxed);
    backend.jobs.fetch_add(1, Ordering::Relaxed);
    backend.busy_ms.fetch_add(elapsed, Ordering::Relaxed);

    Json(json!({
        "status": "SUCCESS",
        "processingTimeMs": elapsed,
        "cpuCycles": job.cpu_intensity as u64 * elapsed * 1_000,
        "memoryUsedBytes": job.ram_intensity as u64 * 1024 * 1024,
        "result": format!("Packet {} processed", job.packet_id),
    }))
}

async fn metrics(State(backend): State<Arc<Backend>>) -> Json<Value> {
    let jobs = backend.jobs.load(Ordering::Relaxed);
    let avg_sec = if jobs == 0 {
        0.0
    } else {
        backend.busy_ms.load(Ordering::Relaxed) as f64 / jobs as f64 / 1000.0
    };
    let active = backend.active.load(Ordering::Relaxed);

    Json(json!({
        "cpuUsagePercent": (active as f64 * 10.0).min(100.0),
        "memoryUsagePercent": (active as f64 * 5.0).min(100.0),
        "avgProcessingTimeSec": avg_sec,
        "currConnections": active,
        "isOpen": !backend.closed.load(Ordering::Relaxed),
    }))
}

async fn open(State(backend): State<Arc<Backend>>) -> StatusCode {
    backend.closed.store(false, Ordering::Relaxed);
    tracing::info!("Opened for new work");
    StatusCode::OK
}

async fn close(State(backend): State<Arc<Backend>>) -> StatusCode {
    backend.closed.store(true, Ordering::Relaxed);
    tracing::info!("Closed for new work");
    StatusCode::OK
}
