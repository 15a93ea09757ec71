//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Scheduler tick (active.rs, fixed interval, first tick immediate)
//!     → run_cycle: every backend probed concurrently
//!         → liveness probe (2xx = healthy)
//!         → operational-status probe (open flag)
//!     → HealthSnapshot written to state.rs (last write wins)
//!     → healthy && open mirrored into the registry for reporting
//!
//! Selection reads state.rs only.
//! ```
//!
//! # Design Decisions
//! - No hysteresis or in-cycle retry; the next cycle is the retry
//! - Cycles never overlap, including ones triggered from the admin API
//! - Unknown backends have no snapshot and are therefore unavailable

pub mod active;
pub mod state;

pub use active::HealthMonitor;
pub use state::{HealthCache, HealthSnapshot};
