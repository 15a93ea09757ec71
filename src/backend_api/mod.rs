//! Backend contract client.
//!
//! # Data Flow
//! ```text
//! HealthMonitor   → liveness + operational_status
//! PacketForwarder → process_packet (PacketJob → PacketReply)
//! ControlServer   → health_metrics, admin_call (open / close)
//! ```

pub mod client;
pub mod types;

pub use client::{BackendClient, BackendError};
pub use types::{BackendHealthMetrics, OperationalStatus, PacketJob, PacketReply};
