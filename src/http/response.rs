//! Response translation.
//!
//! # Responsibilities
//! - Turn a [`ProxyOutcome`] into an HTTP response
//! - Strip connection-level hop-by-hop headers; the body is re-framed here

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, header};
use axum::response::{IntoResponse, Response};

use crate::dispatch::ProxyOutcome;

fn is_hop_by_hop(name: &HeaderName) -> bool {
    name == header::CONNECTION || name == header::TRANSFER_ENCODING || name.as_str() == "keep-alive"
}

/// Copy backend headers, dropping hop-by-hop ones.
pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        if !is_hop_by_hop(name) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

impl IntoResponse for ProxyOutcome {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = strip_hop_by_hop(&self.headers);
        response
    }
}
