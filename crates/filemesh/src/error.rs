//! Error types for the filemesh processes.

use std::net::SocketAddr;

use filemesh_store::StoreError;
use filemesh_sync::SyncError;
use thiserror::Error;

/// Errors that can occur while starting or running a peer or tracker.
#[derive(Debug, Error)]
pub enum FilemeshError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// The service listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Every port from `start` upward was taken.
    #[error("no free port at or above {start}")]
    NoFreePort { start: u16 },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for filemesh operations.
pub type Result<T> = std::result::Result<T, FilemeshError>;
