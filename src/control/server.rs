//! TCP control-plane server.
//!
//! # Responsibilities
//! - Accept connections under a connection limit
//! - Run one long-lived request/response loop per connection
//! - Execute PING, GET_STATUS, OPEN_SERVER and CLOSE_SERVER
//!
//! Shutdown is observed only while waiting for the next frame header, so a frame
//! that has started is always answered.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::Instrument;

use crate::backend_api::BackendClient;
use crate::config::ControlConfig;
use crate::control::codec::{self, FrameError};
use crate::control::command::{
    CommandError, ControlAction, ControlCommand, ControlResponse, ServerStatus,
};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::net::{ConnectionTracker, Listener};
use crate::observability::metrics;

/// How long a stopping server waits for open connections to finish.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ControlServer {
    client: BackendClient,
    config: ControlConfig,
    timeout: Duration,
    tracker: ConnectionTracker,
}

impl ControlServer {
    pub fn new(client: BackendClient, config: ControlConfig) -> Self {
        Self {
            client,
            timeout: Duration::from_millis(config.request_timeout_ms),
            config,
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Accept loop. Returns after shutdown once connections have drained or
    /// [`DRAIN_TIMEOUT`] has passed.
    pub async fn run(self: Arc<Self>, listener: Listener, mut shutdown: ShutdownSignal) {
        match listener.local_addr() {
            Ok(addr) => tracing::info!(address = %addr, "Control server listening"),
            Err(e) => tracing::warn!(error = %e, "Control server listening on unknown address"),
        }

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr, permit)) => {
                        let server = Arc::clone(&self);
                        let guard = self.tracker.track();
                        let span = tracing::debug_span!(
                            "control_connection",
                            connection_id = %guard.id(),
                            peer_addr = %peer_addr
                        );
                        let signal = shutdown.clone();
                        tokio::spawn(
                            async move {
                                let _permit = permit;
                                let _guard = guard;
                                server.handle_connection(stream, peer_addr, signal).await;
                            }
                            .instrument(span),
                        );
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Control accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Control server received shutdown signal, stopping accept loop");
                    break;
                }
            }
        }

        drop(listener);
        if !self.tracker.wait_for_drain(DRAIN_TIMEOUT).await {
            tracing::warn!(
                active = self.tracker.active_count(),
                "Control connections still open after drain timeout"
            );
        }
        tracing::info!("Control server stopped");
    }

    /// Per-connection frame loop. Always closes the stream on exit.
    pub async fn handle_connection<S>(&self, mut stream: S, peer_addr: SocketAddr, mut shutdown: ShutdownSignal)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        metrics::control_connection_opened();
        tracing::debug!(peer_addr = %peer_addr, "Control client connected");

        loop {
            let header = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::debug!(peer_addr = %peer_addr, "Closing control connection for shutdown");
                    break;
                }
                header = codec::read_header(&mut stream) => header,
            };

            let len = match header {
                Ok(Some(len)) => len,
                Ok(None) => {
                    tracing::debug!(peer_addr = %peer_addr, "Control client disconnected");
                    break;
                }
                Err(e) => {
                    tracing::warn!(peer_addr = %peer_addr, error = %e, "Control read failed");
                    break;
                }
            };

            // a started frame must arrive in full within the request timeout
            let body = tokio::time::timeout(self.timeout, codec::read_body(&mut stream, len)).await;
            let payload = match body {
                Ok(Ok(payload)) => payload,
                Ok(Err(FrameError::InvalidLength(len))) => {
                    tracing::warn!(peer_addr = %peer_addr, length = len, "Invalid message length");
                    break;
                }
                Ok(Err(e)) => {
                    tracing::warn!(peer_addr = %peer_addr, error = %e, "Control read failed");
                    break;
                }
                Err(_) => {
                    tracing::warn!(
                        peer_addr = %peer_addr,
                        length = len,
                        timeout_ms = self.config.request_timeout_ms,
                        "Timed out reading control frame body"
                    );
                    break;
                }
            };

            let response = self.process(&payload).await;
            if let Err(e) = codec::write_frame(&mut stream, &response.to_bytes()).await {
                tracing::warn!(peer_addr = %peer_addr, error = %e, "Control write failed");
                break;
            }
        }

        let _ = stream.shutdown().await;
        metrics::control_connection_closed();
    }

    /// Parse and execute one frame payload.
    pub async fn process(&self, payload: &[u8]) -> ControlResponse {
        match ControlCommand::parse(payload) {
            Ok(command) => {
                metrics::record_control_command(command.action.as_str());
                self.execute(command).await
            }
            Err(e) => {
                metrics::record_control_command("INVALID");
                tracing::warn!(error = %e, "Rejected control request");
                e.into()
            }
        }
    }

    pub async fn execute(&self, command: ControlCommand) -> ControlResponse {
        match command.action {
            ControlAction::Ping => ControlResponse::pong(),
            ControlAction::GetStatus => ControlResponse::servers(self.query_status().await),
            ControlAction::OpenServer | ControlAction::CloseServer => match command.server_url {
                Some(url) => self.set_open(&url, command.action == ControlAction::OpenServer).await,
                None => CommandError::MissingServerUrl.into(),
            },
        }
    }

    /// Query every configured backend URL concurrently, keeping list order.
    async fn query_status(&self) -> Vec<ServerStatus> {
        let calls = self.config.server_urls.iter().map(|url| async move {
            let (status_code, health) = self
                .client
                .health_metrics(url, &self.config.health_path, self.timeout)
                .await;
            ServerStatus {
                url: url.clone(),
                status_code,
                health,
            }
        });
        join_all(calls).await
    }

    async fn set_open(&self, url: &str, open: bool) -> ControlResponse {
        let (path, verb) = if open {
            (&self.config.open_path, "open")
        } else {
            (&self.config.close_path, "close")
        };

        tracing::info!(server_url = %url, action = verb, "Administrative server call");
        let status = self.client.admin_call(url, path, self.timeout).await;

        if (200..300).contains(&status) {
            let past = if open { "opened" } else { "closed" };
            ControlResponse {
                server_url: Some(url.to_string()),
                ..ControlResponse::ok(format!("Server {url} {past}"))
            }
        } else {
            tracing::warn!(server_url = %url, status, action = verb, "Administrative call rejected");
            ControlResponse {
                status_code: Some(status),
                ..ControlResponse::error(format!("Failed to {verb} server"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::command::ResponseStatus;

    fn server(urls: Vec<String>) -> ControlServer {
        let config = ControlConfig {
            server_urls: urls,
            request_timeout_ms: 300,
            ..ControlConfig::default()
        };
        ControlServer::new(BackendClient::new().unwrap(), config)
    }

    #[tokio::test]
    async fn ping_pongs() {
        let response = server(vec![]).process(br#"{"action":"PING"}"#).await;
        assert_eq!(response, ControlResponse::pong());
    }

    #[tokio::test]
    async fn malformed_requests_get_error_replies() {
        let s = server(vec![]);
        let response = s.process(b"not json").await;
        assert_eq!(response.status, ResponseStatus::Error);
        assert!(response.message.unwrap().starts_with("Invalid JSON format"));

        let response = s.process(br#"{"action":"OPEN_SERVER","serverUrl":""}"#).await;
        assert_eq!(response.message.as_deref(), Some("Server URL required"));
    }

    #[tokio::test]
    async fn unreachable_backends_report_500() {
        let s = server(vec!["http://127.0.0.1:9".into()]);
        let response = s.execute(ControlCommand::get_status()).await;
        assert!(response.is_ok());
        let servers = response.servers.unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].status_code, 500);
        assert!(servers[0].health.is_none());

        let response = s.execute(ControlCommand::close("http://127.0.0.1:9")).await;
        assert_eq!(response.status, ResponseStatus::Error);
        assert_eq!(response.message.as_deref(), Some("Failed to close server"));
        assert_eq!(response.status_code, Some(500));
    }

    #[tokio::test]
    async fn stalled_frame_body_closes_connection() {
        use tokio::io::AsyncReadExt;

        let s = server(vec![]);
        let shutdown = crate::lifecycle::Shutdown::new();
        let (mut client, conn) = tokio::io::duplex(64);
        client.write_all(&10u32.to_be_bytes()).await.unwrap();
        client.write_all(b"{\"ac").await.unwrap();

        let peer: SocketAddr = "127.0.0.1:1".parse().unwrap();
        tokio::time::timeout(
            Duration::from_secs(2),
            s.handle_connection(conn, peer, shutdown.subscribe()),
        )
        .await
        .unwrap();

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn empty_url_list_yields_empty_servers() {
        let response = server(vec![]).execute(ControlCommand::get_status()).await;
        assert_eq!(response.servers, Some(vec![]));
    }
}
