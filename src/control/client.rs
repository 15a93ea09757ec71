//! Control-plane client.
//!
//! One request frame out, one response frame back, over a persistent connection.

use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;

use crate::control::codec::{self, FrameError};
use crate::control::command::{ControlCommand, ControlResponse};

#[derive(Debug, Error)]
pub enum ControlClientError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    #[error("Connection attempt to {0} timed out")]
    Timeout(String),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("Server closed the connection")]
    Closed,

    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct ControlClient {
    stream: TcpStream,
}

impl ControlClient {
    pub async fn connect(addr: &str, timeout: Duration) -> Result<Self, ControlClientError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ControlClientError::Timeout(addr.to_string()))?
            .map_err(|source| ControlClientError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self { stream })
    }

    /// Send a command and wait for its reply.
    pub async fn send(&mut self, command: &ControlCommand) -> Result<ControlResponse, ControlClientError> {
        let payload = serde_json::to_vec(&command.to_json())?;
        self.send_raw(&payload).await
    }

    /// Send an arbitrary payload. Useful for exercising error replies.
    pub async fn send_raw(&mut self, payload: &[u8]) -> Result<ControlResponse, ControlClientError> {
        codec::write_frame(&mut self.stream, payload).await?;
        let reply = codec::read_frame(&mut self.stream)
            .await?
            .ok_or(ControlClientError::Closed)?;
        Ok(serde_json::from_slice(&reply)?)
    }

    pub async fn ping(&mut self) -> Result<ControlResponse, ControlClientError> {
        self.send(&ControlCommand::ping()).await
    }
}
