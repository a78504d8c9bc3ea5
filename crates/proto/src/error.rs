//! Error types for the realmbridge protocol crate

use thiserror::Error;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtoError>;

/// Primary error type for packet and connection handling
#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("unexpected end of packet data")]
    UnexpectedEof,

    #[error("malformed packet: {0}")]
    Malformed(String),

    #[error("connection closed")]
    Closed,

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtoError {
    /// True for errors that end a connection rather than a single packet.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Closed | Self::Io(_) | Self::Timeout(_))
    }
}
