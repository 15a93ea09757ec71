//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Selection algorithm name (`ROUND_ROBIN`, `LEAST_CONNECTIONS`, `WEIGHTED`, `RANDOM`).
    pub algorithm: String,

    /// HTTP listener configuration.
    pub listener: ListenerConfig,

    /// Backend server definitions.
    pub backends: Vec<BackendConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Proxy and packet dispatch settings.
    pub dispatch: DispatchConfig,

    /// TCP control protocol settings.
    pub control: ControlConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            algorithm: "ROUND_ROBIN".to_string(),
            listener: ListenerConfig::default(),
            backends: default_backends(),
            health_check: HealthCheckConfig::default(),
            dispatch: DispatchConfig::default(),
            control: ControlConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

fn default_backends() -> Vec<BackendConfig> {
    (1..=5)
        .map(|i| BackendConfig {
            id: format!("server-{}", i),
            host: "localhost".to_string(),
            port: 8080 + i,
            weight: 1,
        })
        .collect()
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum buffered request body for proxy and admin calls.
    pub max_body_bytes: usize,

    /// Whole-request timeout applied by the HTTP layer, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            request_timeout_secs: 120,
        }
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Unique backend identifier.
    pub id: String,

    /// Backend host name or IP.
    pub host: String,

    /// Backend port.
    pub port: u16,

    /// Weight for weighted load balancing (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the periodic health scheduler.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Timeout applied to each individual probe, in milliseconds.
    pub timeout_ms: u64,

    /// Liveness endpoint (2xx = alive).
    pub liveness_path: String,

    /// Operational-status endpoint returning `{"open": bool}`.
    pub status_path: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_ms: 3000,
            liveness_path: "/api/v1/health".to_string(),
            status_path: "/api/v1/server/status".to_string(),
        }
    }
}

/// Dispatch configuration shared by the proxy and packet paths.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Value injected as `X-Forwarded-By`.
    pub proxy_name: String,

    /// A backend at or above this many connections is not selectable.
    pub max_connections_per_backend: usize,

    /// Proxy request timeout in seconds.
    pub proxy_timeout_secs: u64,

    /// Packet job timeout in seconds.
    pub packet_timeout_secs: u64,

    /// Backend job-processing endpoint.
    pub packet_path: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            proxy_name: "compute-balancer".to_string(),
            max_connections_per_backend: 100,
            proxy_timeout_secs: 30,
            packet_timeout_secs: 30,
            packet_path: "/api/v1/fakePacket".to_string(),
        }
    }
}

/// TCP control protocol configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Enable the control listener.
    pub enabled: bool,

    /// Bind address (e.g., "0.0.0.0:9090").
    pub bind_address: String,

    /// Maximum concurrent control connections (backpressure).
    pub max_connections: usize,

    /// Timeout for each backend call made on behalf of a command, in milliseconds.
    pub request_timeout_ms: u64,

    /// Backend base URLs addressed by GET_STATUS. Independent of the registry.
    pub server_urls: Vec<String>,

    /// Metrics endpoint on each backend.
    pub health_path: String,

    /// Administrative open endpoint.
    pub open_path: String,

    /// Administrative close endpoint.
    pub close_path: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:9090".to_string(),
            max_connections: 256,
            request_timeout_ms: 5000,
            server_urls: (8081..=8085)
                .map(|port| format!("http://localhost:{}", port))
                .collect(),
            health_path: "/server/health".to_string(),
            open_path: "/server/open".to_string(),
            close_path: "/server/close".to_string(),
        }
    }
}

impl ControlConfig {
    /// Port component of `bind_address`, if it parses.
    pub fn port(&self) -> Option<u16> {
        self.bind_address
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9100".to_string(),
        }
    }
}
