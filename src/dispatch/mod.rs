//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Arbitrary HTTP request (http/server.rs fallback)
//!     → proxy.rs: select → acquire slot → forward verbatim → ProxyOutcome
//!
//! Packet submission (admin/handlers.rs)
//!     → packet.rs: resolve target → acquire slot → PacketJob → PacketResult
//! ```
//!
//! # Design Decisions
//! - One best-effort attempt per dispatch, no retries
//! - Failures are outcomes, never errors crossing into handlers

pub mod packet;
pub mod proxy;

pub use packet::{PacketForwarder, PacketRequest, PacketResult, PacketStatus};
pub use proxy::{ProxyDispatcher, ProxyOutcome};
