//! Transport abstraction for tether.
//!
//! This module provides a pluggable transport layer that abstracts
//! the underlying connection mechanism (TCP, mock for testing).
//!
//! # Design
//!
//! The transport trait is async and connection-oriented:
//! - `connect()` establishes a connection
//! - `send()` transmits one frame (the transport adds the line terminator)
//! - `recv()` receives one frame with the terminator stripped
//! - `close()` gracefully terminates
//!
//! All methods take `&self` so the session reader task can sit in `recv()`
//! while the control loop keeps sending heartbeats.
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.connect("127.0.0.1:7420").await?;
//! transport.send(&Frame::heartbeat().to_bytes()?).await?;
//! let response = transport.recv().await?;
//! ```

mod mock;
mod tcp;

pub use mock::MockTransport;
pub use tcp::TcpTransport;

use async_trait::async_trait;
use thiserror::Error;

/// Maximum size of a single frame line (1 MiB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed by the peer.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// A frame exceeded [`MAX_MESSAGE_SIZE`].
    #[error("message too large: {size} > {MAX_MESSAGE_SIZE}")]
    MessageTooLarge {
        /// Observed size in bytes (a lower bound when receiving).
        size: usize,
    },

    /// Connection timeout.
    #[error("connection timeout")]
    Timeout,
}

/// Transport trait for sending and receiving session frames.
///
/// Implementations handle the underlying connection mechanism
/// (TCP, mock, etc).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the server at `address` (`host:port` for TCP).
    async fn connect(&self, address: &str) -> Result<(), TransportError>;

    /// Send one frame.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Receive one frame.
    ///
    /// Blocks until data is available or connection closes.
    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), TransportError>;
}
