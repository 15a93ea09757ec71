//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch asks for a backend
//!     → selector.rs (available set = registry ∩ health cache ∩ under ceiling)
//!     → Apply the active algorithm (state.rs):
//!         - round_robin.rs (rotate through backends)
//!         - least_conn.rs (pick backend with fewest connections)
//!         - weighted.rs (cumulative weight walk)
//!         - random.rs (uniform draw)
//!     → backend.rs (acquire a scoped connection slot)
//!     → Return instance or SelectionError
//! ```
//!
//! # Design Decisions
//! - Strategies are stateless apart from the round-robin cursor
//! - The registry is pure state; availability lives in the health cache
//! - Algorithm is read once per selection, so a switch never affects one in flight

pub mod algorithm;
pub mod backend;
pub mod least_conn;
pub mod random;
pub mod registry;
pub mod round_robin;
pub mod selector;
pub mod state;
pub mod weighted;

use std::sync::Arc;

use crate::load_balancer::backend::ServerInstance;

pub use algorithm::Algorithm;
pub use backend::{BackendConnectionGuard, ServerView};
pub use registry::Registry;
pub use selector::{SelectionEngine, SelectionError};
pub use state::BalancerState;

/// A selection strategy over an already-filtered candidate list.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    fn next_server(&self, backends: &[Arc<ServerInstance>]) -> Option<Arc<ServerInstance>>;
}
