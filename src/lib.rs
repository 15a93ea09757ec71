//! Compute balancer library.
//!
//! Registry, health monitoring, selection, dispatch and the TCP control plane,
//! consumed by the `compute-balancer` and `lb-cli` binaries and the integration tests.

pub mod admin;
pub mod backend_api;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;

pub use config::schema::BalancerConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
