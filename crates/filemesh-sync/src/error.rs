//! Error types for the sync module.

use filemesh_core::ContentHash;
use filemesh_store::StoreError;
use thiserror::Error;

/// Errors that can occur while talking to the tracker or to other peers.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Socket-level error.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// Local filesystem operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Payload did not parse as the expected message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Frame header announced more bytes than allowed.
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: u64, max: u64 },

    /// The remote side closed the connection before a complete message.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// No progress within the configured timeout.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Received bytes hash differently from what the sender announced.
    #[error("integrity failure for {what}: expected {expected}, got {actual}")]
    IntegrityFailure {
        what: String,
        expected: ContentHash,
        actual: ContentHash,
    },

    /// Fewer body bytes arrived than announced.
    #[error("truncated transfer for {what}: expected {expected} bytes, got {actual}")]
    Truncated {
        what: String,
        expected: u64,
        actual: u64,
    },

    /// Bounded retry gave up.
    #[error("giving up on {what} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        what: String,
        attempts: u32,
        last_error: String,
    },

    /// A spawned task panicked or was cancelled.
    #[error("task failed: {0}")]
    TaskFailed(String),
}

impl SyncError {
    /// Whether repeating the same request could succeed.
    ///
    /// Invalid names never become valid; everything else may be transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SyncError::Store(StoreError::Core(_)) | SyncError::RetriesExhausted { .. }
        )
    }
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(e: tokio::task::JoinError) -> Self {
        SyncError::TaskFailed(e.to_string())
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
