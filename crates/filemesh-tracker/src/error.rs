//! Error types for the tracker.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors that can occur while running the tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The listening socket could not be bound. Fatal at startup.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Framing, decoding or timeout on one connection.
    #[error(transparent)]
    Sync(#[from] filemesh_sync::SyncError),
}

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
