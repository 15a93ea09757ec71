//! Length-prefixed frame codec.
//!
//! # Wire Protocol
//!
//! ```text
//! [4-byte length, u32 big-endian] [length bytes of UTF-8 JSON]
//! ```
//!
//! A declared length of zero or above [`MAX_FRAME_LEN`] is a protocol violation.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum payload size (1 MiB).
pub const MAX_FRAME_LEN: u32 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid frame length: {0} (max {MAX_FRAME_LEN})")]
    InvalidLength(u32),
}

/// Check a declared length against protocol bounds.
pub fn validate_len(len: u32) -> Result<usize, FrameError> {
    if len == 0 || len > MAX_FRAME_LEN {
        return Err(FrameError::InvalidLength(len));
    }
    Ok(len as usize)
}

/// Read the 4-byte length prefix. `Ok(None)` means the peer closed the stream.
pub async fn read_header<R>(reader: &mut R) -> Result<Option<u32>, FrameError>
where
    R: AsyncRead + Unpin,
{
    match reader.read_u32().await {
        Ok(len) => Ok(Some(len)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(FrameError::Io(e)),
    }
}

/// Read exactly one frame body of a declared length. The length is validated first.
pub async fn read_body<R>(reader: &mut R, len: u32) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let len = validate_len(len)?;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Read one complete frame. `Ok(None)` on clean end-of-stream.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    match read_header(reader).await? {
        Some(len) => Ok(Some(read_body(reader, len).await?)),
        None => Ok(None),
    }
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::InvalidLength(u32::MAX))?;
    validate_len(len)?;

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
