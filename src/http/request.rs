//! Request identification.
//!
//! # Responsibilities
//! - Name the request-id header shared by the tower-http layers
//! - Read the id back out for log fields
//!
//! Ids are UUID v4, generated by `SetRequestIdLayer` when the caller sends none
//! and echoed on the response by `PropagateRequestIdLayer`.

use axum::http::{HeaderMap, HeaderName};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Access to the request id of an inbound request.
pub trait RequestIdExt {
    fn request_id(&self) -> &str;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> &str {
        self.get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}
