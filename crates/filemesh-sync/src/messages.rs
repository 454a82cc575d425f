//! Message limits and JSON encoding for framed payloads.
//!
//! The payload types themselves live in `filemesh-core` so the tracker can
//! share them.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, SyncError};

pub use filemesh_core::{BlockRequest, Directory, HeartbeatRequest};

/// Message size limits.
pub mod limits {
    /// Max bytes of one framed JSON message (directory responses are the largest).
    pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;
    /// Max bytes of a block request frame.
    pub const MAX_BLOCK_REQUEST_LEN: u32 = 64 * 1024;
}

/// Serialize a payload to JSON bytes.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(message).map_err(|e| SyncError::InvalidMessage(e.to_string()))
}

/// Parse JSON bytes into a payload.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| SyncError::InvalidMessage(e.to_string()))
}
