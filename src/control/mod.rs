//! TCP control plane.
//!
//! # Data Flow
//! ```text
//! net::Listener accept (bounded)
//!     → server.rs per-connection loop
//!         → codec.rs read frame (length prefix, 1 MiB cap)
//!         → command.rs parse (action, serverUrl)
//!         → execute: PING | GET_STATUS | OPEN_SERVER | CLOSE_SERVER
//!         → codec.rs write reply frame
//!
//! client.rs speaks the same framing for lb-cli and tests.
//! ```
//!
//! # Design Decisions
//! - Decode and command errors are answered, the connection stays open
//! - A bad frame length closes the connection with no reply
//! - GET_STATUS targets a static URL list, not the registry

pub mod client;
pub mod codec;
pub mod command;
pub mod server;

pub use client::{ControlClient, ControlClientError};
pub use codec::{FrameError, MAX_FRAME_LEN};
pub use command::{CommandError, ControlAction, ControlCommand, ControlResponse, ServerStatus};
pub use server::ControlServer;
