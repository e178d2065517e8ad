//! Error types for the skeleton receiver.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors that can occur when decoding a skeleton payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload was empty or whitespace only.
    #[error("Empty payload")]
    Empty,

    /// The payload is not a valid skeleton document.
    #[error("Malformed skeleton payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Errors that can occur when encoding a skeleton frame.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Failed to serialize frame: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The encoded document does not fit into a single datagram.
    #[error("Encoded frame is {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },
}

/// Errors raised by the UDP listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// `bind_addr` is not an IP address.
    #[error("Invalid listen address {addr}: {source}")]
    InvalidAddress {
        addr: String,
        source: std::net::AddrParseError,
    },

    /// The socket could not be bound (port in use, permission denied, ...).
    #[error("Failed to bind UDP socket on {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    /// The receive thread could not be spawned.
    #[error("Failed to spawn listener thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("Socket error: {0}")]
    Io(#[from] io::Error),
}
