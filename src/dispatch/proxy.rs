//! Generic HTTP proxy dispatch.
//!
//! # Responsibilities
//! - Select a backend with the pool algorithm
//! - Forward method, path, headers and body, adding two trace headers
//! - Convert every failure into a 502/503 outcome
//!
//! The connection slot is held by a [`BackendConnectionGuard`] until the backend
//! body has been fully read, then released on every exit path.
//!
//! [`BackendConnectionGuard`]: crate::load_balancer::BackendConnectionGuard

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, Uri, header};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};

use crate::config::DispatchConfig;
use crate::load_balancer::SelectionEngine;
use crate::observability::metrics;

pub const X_FORWARDED_BY: HeaderName = HeaderName::from_static("x-forwarded-by");
pub const X_TARGET_SERVER: HeaderName = HeaderName::from_static("x-target-server");

/// Result of one proxied call, returned to the HTTP layer as-is.
#[derive(Debug, Clone)]
pub struct ProxyOutcome {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Backend that served the call, if one was selected.
    pub backend: Option<String>,
}

impl ProxyOutcome {
    fn text(status: StatusCode, message: String, backend: Option<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Self {
            status,
            headers,
            body: Bytes::from(message),
            backend,
        }
    }
}

pub struct ProxyDispatcher {
    selector: Arc<SelectionEngine>,
    client: Client<HttpConnector, Body>,
    proxy_name: HeaderValue,
    timeout: Duration,
}

impl ProxyDispatcher {
    pub fn new(selector: Arc<SelectionEngine>, config: &DispatchConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let proxy_name = HeaderValue::from_str(&config.proxy_name)
            .unwrap_or_else(|_| HeaderValue::from_static("compute-balancer"));

        Self {
            selector,
            client,
            proxy_name,
            timeout: Duration::from_secs(config.proxy_timeout_secs),
        }
    }

    /// Forward one request. Never fails: errors become 503 or 502 outcomes.
    pub async fn handle(
        &self,
        method: Method,
        full_path: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> ProxyOutcome {
        let start_time = Instant::now();
        let method_str = method.to_string();
        let state = self.selector.state();

        let server = match self.selector.select_server() {
            Ok(server) => server,
            Err(e) => {
                state.record_failure();
                metrics::record_request(&method_str, 503, "none", start_time);
                return ProxyOutcome::text(StatusCode::SERVICE_UNAVAILABLE, e.to_string(), None);
            }
        };

        let guard = server.acquire();
        let backend_id = guard.id.clone();

        tracing::debug!(
            method = %method,
            path = %full_path,
            server_id = %backend_id,
            "Proxying request"
        );

        let forwarded = self
            .forward(method, &guard.url(), &backend_id, full_path, headers, body)
            .await;

        let outcome = match forwarded {
            Ok((status, headers, body)) => {
                state.record_success();
                metrics::record_request(&method_str, status.as_u16(), &backend_id, start_time);
                ProxyOutcome {
                    status,
                    headers,
                    body,
                    backend: Some(backend_id),
                }
            }
            Err(e) => {
                state.record_failure();
                metrics::record_request(&method_str, 502, &backend_id, start_time);
                tracing::error!(server_id = %backend_id, error = %e, "Proxy request failed");
                ProxyOutcome::text(
                    StatusCode::BAD_GATEWAY,
                    format!("Proxy error: {e}"),
                    Some(backend_id),
                )
            }
        };

        drop(guard);
        outcome
    }

    async fn forward(
        &self,
        method: Method,
        base_url: &str,
        backend_id: &str,
        full_path: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<(StatusCode, HeaderMap, Bytes), String> {
        let path = if full_path.starts_with('/') {
            full_path.to_string()
        } else {
            format!("/{full_path}")
        };
        let uri: Uri = format!("{base_url}{path}")
            .parse()
            .map_err(|e| format!("invalid upstream URI: {e}"))?;

        let mut request = Request::builder().method(method).uri(uri);
        if let Some(outbound) = request.headers_mut() {
            for (name, value) in headers.iter() {
                if is_request_excluded(name) {
                    continue;
                }
                outbound.append(name.clone(), value.clone());
            }
            outbound.insert(X_FORWARDED_BY, self.proxy_name.clone());
            if let Ok(target) = HeaderValue::from_str(backend_id) {
                outbound.insert(X_TARGET_SERVER, target);
            }
        }
        let request = request
            .body(Body::from(body))
            .map_err(|e| format!("invalid upstream request: {e}"))?;

        let call = async {
            let response = self.client.request(request).await.map_err(|e| e.to_string())?;
            let (parts, incoming) = response.into_parts();
            let bytes = axum::body::to_bytes(Body::new(incoming), usize::MAX)
                .await
                .map_err(|e| e.to_string())?;
            Ok::<_, String>((parts.status, parts.headers, bytes))
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(format!("request timed out after {}s", self.timeout.as_secs())),
        }
    }
}

/// Headers the outbound request must not inherit: the client sets its own host
/// and framing.
fn is_request_excluded(name: &HeaderName) -> bool {
    name == header::HOST
        || name == header::CONTENT_LENGTH
        || name == header::TRANSFER_ENCODING
        || name == header::CONNECTION
        || name.as_str() == "keep-alive"
}
