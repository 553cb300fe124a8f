//! Worker/hub wire protocol
//!
//! Worker processes reach their collectives through a hub run by the
//! launcher. Every collective is one request from each worker followed by
//! one reply from the hub.
//!
//! # Message Flow
//!
//! ```text
//! Worker (rank r)                  Hub
//!     |                              |
//!     |-- HELLO(version, r, W) ----->|
//!     |<------- WELCOME -------------|
//!     |                              |
//!     |-- BARRIER ------------------>|   (waits for all W ranks)
//!     |<------- RELEASED ------------|
//!     |                              |
//!     |-- REDUCE(op, root, v) ------>|   (waits for all W ranks)
//!     |<------- REDUCED(Some|None) --|   (Some only on root)
//!     |                              |
//!     |-- SUMMARY(estimate?) ------->|   (end of session)
//! ```
//!
//! If ranks disagree on a collective, the hub answers every rank with
//! ABORT and closes the session.
//!
//! # Message Framing
//!
//! Each message is prefixed with a 4-byte length field (little-endian u32):
//!
//! ```text
//! [4 bytes: message length][N bytes: MessagePack-serialized message]
//! ```

use super::ReduceOp;
use crate::stats::Estimate;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Protocol version
///
/// Workers and hub must agree; the hub rejects a HELLO with another version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest accepted frame body
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Protocol message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Message {
    /// First message on a connection (Worker → Hub)
    Hello {
        protocol_version: u32,
        rank: usize,
        size: usize,
    },

    /// Connection accepted (Hub → Worker)
    Welcome,

    /// Barrier request (Worker → Hub)
    Barrier,

    /// Barrier complete (Hub → Worker)
    Released,

    /// Reduction request (Worker → Hub)
    Reduce { op: ReduceOp, root: usize, value: f64 },

    /// Reduction complete (Hub → Worker); `value` is set only for the root
    Reduced { value: Option<f64> },

    /// End of session (Worker → Hub); the root attaches its estimate
    Summary { estimate: Option<Estimate> },

    /// Session aborted (Hub → Worker)
    Abort { reason: String },
}

impl Message {
    /// Short name used in logs and error messages
    pub fn kind(&self) -> String {
        match self {
            Message::Hello { .. } => "hello".to_string(),
            Message::Welcome => "welcome".to_string(),
            Message::Barrier => "barrier".to_string(),
            Message::Released => "released".to_string(),
            Message::Reduce { op, .. } => format!("reduce({})", op),
            Message::Reduced { .. } => "reduced".to_string(),
            Message::Summary { .. } => "summary".to_string(),
            Message::Abort { .. } => "abort".to_string(),
        }
    }
}

/// Serialize a message with its length prefix
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>> {
    let msg_bytes = rmp_serde::to_vec(msg).context("Failed to serialize message")?;

    let msg_len = msg_bytes.len() as u32;
    let mut framed = Vec::with_capacity(4 + msg_bytes.len());
    framed.extend_from_slice(&msg_len.to_le_bytes());
    framed.extend_from_slice(&msg_bytes);

    Ok(framed)
}

fn check_frame_len(msg_len: usize) -> Result<()> {
    if msg_len > MAX_FRAME_LEN {
        anyhow::bail!("Message too large: {} bytes (max {})", msg_len, MAX_FRAME_LEN);
    }
    Ok(())
}

/// Read a complete message from a blocking stream
pub fn read_message_blocking<R: Read>(reader: &mut R) -> Result<Message> {
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .context("Failed to read message length")?;

    let msg_len = u32::from_le_bytes(len_buf) as usize;
    check_frame_len(msg_len)?;

    let mut msg_buf = vec![0u8; msg_len];
    reader
        .read_exact(&mut msg_buf)
        .context("Failed to read message body")?;

    rmp_serde::from_slice(&msg_buf).context("Failed to deserialize message")
}

/// Write a message to a blocking stream
pub fn write_message_blocking<W: Write>(writer: &mut W, msg: &Message) -> Result<()> {
    let framed = serialize_message(msg)?;
    writer.write_all(&framed).context("Failed to write message")?;
    writer.flush().context("Failed to flush stream")?;
    Ok(())
}

/// Read a complete message from an async stream
pub async fn read_message<R>(reader: &mut R) -> Result<Message>
where
    R: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::AsyncReadExt;

    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .context("Failed to read message length")?;

    let msg_len = u32::from_le_bytes(len_buf) as usize;
    check_frame_len(msg_len)?;

    let mut msg_buf = vec![0u8; msg_len];
    reader
        .read_exact(&mut msg_buf)
        .await
        .context("Failed to read message body")?;

    rmp_serde::from_slice(&msg_buf).context("Failed to deserialize message")
}

/// Write a message to an async stream
pub async fn write_message<W>(writer: &mut W, msg: &Message) -> Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    use tokio::io::AsyncWriteExt;

    let framed = serialize_message(msg)?;
    writer.write_all(&framed).await.context("Failed to write message")?;
    writer.flush().await.context("Failed to flush stream")?;
    Ok(())
}
