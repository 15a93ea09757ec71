//! Typed HTTP client for the backend contract.
//!
//! Every call takes its own timeout so one slow backend only costs its caller
//! that long.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use url::Url;

use crate::backend_api::types::{BackendHealthMetrics, OperationalStatus, PacketJob, PacketReply};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("Backend returned status {0}")]
    UnexpectedStatus(StatusCode),

    #[error("Invalid backend URL '{0}'")]
    InvalidUrl(String),

    #[error("Invalid backend reply: {0}")]
    Decode(#[from] serde_json::Error),
}

impl BackendError {
    /// The call gave up on its per-call deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::Request(e) if e.is_timeout())
    }
}

/// Status reported for a control call whose request never completed.
pub const TRANSPORT_FAILURE_STATUS: u16 = 500;

/// Shared client for all backend-facing calls.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
}

impl BackendClient {
    pub fn new() -> Result<Self, BackendError> {
        let client = Client::builder()
            .no_proxy()
            .user_agent(concat!("compute-balancer/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    fn endpoint(base_url: &str, path: &str) -> Result<Url, BackendError> {
        let raw = format!("{}{}", base_url.trim_end_matches('/'), path);
        Url::parse(&raw).map_err(|_| BackendError::InvalidUrl(raw))
    }

    /// Liveness probe. Any completed response is returned, the caller decides what 2xx means.
    pub async fn liveness(
        &self,
        base_url: &str,
        path: &str,
        timeout: Duration,
    ) -> Result<StatusCode, BackendError> {
        let url = Self::endpoint(base_url, path)?;
        let response = self.client.get(url).timeout(timeout).send().await?;
        Ok(response.status())
    }

    /// Operational-status probe returning the `open` flag.
    pub async fn operational_status(
        &self,
        base_url: &str,
        path: &str,
        timeout: Duration,
    ) -> Result<OperationalStatus, BackendError> {
        let url = Self::endpoint(base_url, path)?;
        let response = self.client.get(url).timeout(timeout).send().await?;
        if !response.status().is_success() {
            return Err(BackendError::UnexpectedStatus(response.status()));
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Submit one job. An empty 2xx body yields `None`.
    pub async fn process_packet(
        &self,
        base_url: &str,
        path: &str,
        job: &PacketJob,
        timeout: Duration,
    ) -> Result<Option<PacketReply>, BackendError> {
        let url = Self::endpoint(base_url, path)?;
        let response = self
            .client
            .post(url)
            .json(job)
            .timeout(timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BackendError::UnexpectedStatus(response.status()));
        }

        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    /// Metrics endpoint. Never fails: a transport error reports status 500 and no metrics.
    pub async fn health_metrics(
        &self,
        base_url: &str,
        path: &str,
        timeout: Duration,
    ) -> (u16, Option<BackendHealthMetrics>) {
        let url = match Self::endpoint(base_url, path) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(url = %base_url, error = %e, "Skipping metrics request");
                return (TRANSPORT_FAILURE_STATUS, None);
            }
        };

        let response = match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %base_url, error = %e, "Failed to reach backend metrics endpoint");
                return (TRANSPORT_FAILURE_STATUS, None);
            }
        };

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return (status, None);
        }
        let metrics = match response.bytes().await {
            Ok(bytes) => serde_json::from_slice(&bytes).ok(),
            Err(_) => None,
        };
        (status, metrics)
    }

    /// Administrative open/close call (`POST` without body). Transport failure reports 500.
    pub async fn admin_call(&self, base_url: &str, path: &str, timeout: Duration) -> u16 {
        let url = match Self::endpoint(base_url, path) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(url = %base_url, error = %e, "Rejected administrative call");
                return TRANSPORT_FAILURE_STATUS;
            }
        };

        match self.client.post(url).timeout(timeout).send().await {
            Ok(response) => response.status().as_u16(),
            Err(e) => {
                tracing::warn!(url = %base_url, path, error = %e, "Administrative call failed");
                TRANSPORT_FAILURE_STATUS
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let url = BackendClient::endpoint("http://localhost:8081/", "/api/v1/health").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8081/api/v1/health");
    }

    #[test]
    fn endpoint_rejects_garbage() {
        let err = BackendClient::endpoint("not a url", "/x").unwrap_err();
        assert!(matches!(err, BackendError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_reports_transport_status() {
        let client = BackendClient::new().unwrap();
        // port 9 (discard) on loopback is reliably closed in test environments
        let (status, metrics) = client
            .health_metrics("http://127.0.0.1:9", "/server/health", Duration::from_millis(500))
            .await;
        assert_eq!(status, TRANSPORT_FAILURE_STATUS);
        assert!(metrics.is_none());

        let status = client
            .admin_call("http://127.0.0.1:9", "/server/open", Duration::from_millis(500))
            .await;
        assert_eq!(status, TRANSPORT_FAILURE_STATUS);
    }
}
