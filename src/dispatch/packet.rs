//! Packet job forwarding.
//!
//! # Responsibilities
//! - Resolve a target (explicit id or pool selection)
//! - Send a normalized job to the backend's processing endpoint
//! - Report the true outcome in the result, never as an error
//!
//! Exactly one of the processed/failed counters moves per call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend_api::{BackendClient, PacketJob, PacketReply};
use crate::config::DispatchConfig;
use crate::load_balancer::SelectionEngine;
use crate::observability::metrics;

pub const DEFAULT_CPU_INTENSITY: u32 = 5;
pub const DEFAULT_RAM_INTENSITY: u32 = 5;
pub const DEFAULT_PROCESSING_TIME_MS: u64 = 1000;

/// Inbound packet submission. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PacketRequest {
    pub packet_id: Option<String>,
    pub cpu_intensity: Option<u32>,
    pub ram_intensity: Option<u32>,
    pub processing_time_ms: Option<u64>,
    pub payload: Option<String>,
    pub target_server_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PacketStatus {
    Success,
    Failed,
    NoServerAvailable,
}

impl PacketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PacketStatus::Success => "SUCCESS",
            PacketStatus::Failed => "FAILED",
            PacketStatus::NoServerAvailable => "NO_SERVER_AVAILABLE",
        }
    }

    /// Classify a backend-reported status. Only an explicit failure counts as one.
    fn from_backend(status: Option<&str>) -> Self {
        match status {
            Some(s) if s.eq_ignore_ascii_case("FAILED") || s.eq_ignore_ascii_case("ERROR") => {
                PacketStatus::Failed
            }
            _ => PacketStatus::Success,
        }
    }
}

/// Outcome of one forwarded packet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PacketResult {
    pub packet_id: String,
    pub status: PacketStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_server_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_server_url: Option<String>,
    pub processing_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_cycles: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_used_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Status string exactly as the backend reported it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl PacketResult {
    fn new(packet_id: String, status: PacketStatus, elapsed_ms: u64) -> Self {
        Self {
            packet_id,
            status,
            target_server_id: None,
            target_server_url: None,
            processing_time_ms: elapsed_ms,
            cpu_cycles: None,
            memory_used_bytes: None,
            result: None,
            backend_status: None,
            error_message: None,
            timestamp: Utc::now(),
        }
    }
}

pub struct PacketForwarder {
    selector: Arc<SelectionEngine>,
    client: BackendClient,
    packet_path: String,
    timeout: Duration,
}

impl PacketForwarder {
    pub fn new(selector: Arc<SelectionEngine>, client: BackendClient, config: &DispatchConfig) -> Self {
        Self {
            selector,
            client,
            packet_path: config.packet_path.clone(),
            timeout: Duration::from_secs(config.packet_timeout_secs),
        }
    }

    /// Forward one packet. Always returns a result carrying the real outcome.
    pub async fn forward(&self, request: PacketRequest) -> PacketResult {
        let started = Instant::now();
        let state = self.selector.state();
        let packet_id = request
            .packet_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let server = match self.selector.resolve(request.target_server_id.as_deref()) {
            Ok(server) => server,
            Err(e) => {
                state.record_failure();
                metrics::record_packet(PacketStatus::NoServerAvailable.as_str());
                tracing::warn!(
                    packet_id = %packet_id,
                    target = ?request.target_server_id,
                    error = %e,
                    "No server available for packet"
                );
                let mut result =
                    PacketResult::new(packet_id, PacketStatus::NoServerAvailable, elapsed_ms(started));
                result.error_message = Some("No healthy server available".to_string());
                return result;
            }
        };

        let guard = server.acquire();
        let job = PacketJob {
            packet_id: packet_id.clone(),
            cpu_intensity: request.cpu_intensity.unwrap_or(DEFAULT_CPU_INTENSITY),
            ram_intensity: request.ram_intensity.unwrap_or(DEFAULT_RAM_INTENSITY),
            processing_time_ms: request.processing_time_ms.unwrap_or(DEFAULT_PROCESSING_TIME_MS),
            payload: request.payload,
        };
        let url = guard.url();

        let reply = self
            .client
            .process_packet(&url, &self.packet_path, &job, self.timeout)
            .await;
        drop(guard);

        let mut result = match reply {
            Ok(Some(reply)) => Self::from_reply(packet_id, reply, elapsed_ms(started)),
            Ok(None) => PacketResult::new(packet_id, PacketStatus::Success, elapsed_ms(started)),
            Err(e) => {
                tracing::error!(
                    packet_id = %packet_id,
                    server_id = %server.id,
                    error = %e,
                    "Failed to forward packet"
                );
                let mut failed = PacketResult::new(packet_id, PacketStatus::Failed, elapsed_ms(started));
                failed.error_message = Some(e.to_string());
                failed
            }
        };
        result.target_server_id = Some(server.id.clone());
        result.target_server_url = Some(url);

        match result.status {
            PacketStatus::Success => state.record_success(),
            _ => state.record_failure(),
        }
        metrics::record_packet(result.status.as_str());

        tracing::debug!(
            packet_id = %result.packet_id,
            server_id = %server.id,
            status = result.status.as_str(),
            processing_time_ms = result.processing_time_ms,
            "Packet forwarded"
        );
        result
    }

    /// Forward each request independently, sequentially, in input order.
    pub async fn forward_batch(&self, requests: Vec<PacketRequest>) -> Vec<PacketResult> {
        tracing::info!(count = requests.len(), "Forwarding packet batch");
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.forward(request).await);
        }
        results
    }

    fn from_reply(packet_id: String, reply: PacketReply, elapsed_ms: u64) -> PacketResult {
        let status = PacketStatus::from_backend(reply.status.as_deref());
        let mut result = PacketResult::new(
            packet_id,
            status,
            reply.processing_time_ms.unwrap_or(elapsed_ms),
        );
        result.cpu_cycles = reply.cpu_cycles;
        result.memory_used_bytes = reply.memory_used_bytes;
        result.result = reply.result_text();
        result.backend_status = reply.status;
        result
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
