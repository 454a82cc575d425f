//! Wire payloads exchanged between peers and the tracker.
//!
//! Framing lives in `filemesh-sync`; these are only the JSON bodies.

use serde::{Deserialize, Serialize};

use crate::types::FileEntry;

/// Block index within a file. 0 requests the whole file; blocks count from 1.
pub type BlockIndex = u64;

/// Index meaning "the whole, unpartitioned file".
pub const WHOLE_FILE: BlockIndex = 0;

/// Peer to tracker: liveness refresh plus the full local inventory.
///
/// The tracker answers with the whole [`Directory`](crate::Directory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    /// Port the peer serves blocks on.
    pub port: u16,
    pub files: Vec<FileEntry>,
}

/// Peer to peer: ask for one block, or the whole file at index 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRequest {
    pub name: String,
    #[serde(rename = "blockIdx")]
    pub block_idx: BlockIndex,
}

impl BlockRequest {
    pub fn new(name: impl Into<String>, block_idx: BlockIndex) -> Self {
        Self {
            name: name.into(),
            block_idx,
        }
    }

    pub fn whole_file(name: impl Into<String>) -> Self {
        Self::new(name, WHOLE_FILE)
    }

    pub fn is_whole_file(&self) -> bool {
        self.block_idx == WHOLE_FILE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_request_json() {
        let req = BlockRequest::new("movie.mkv", 3);
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"name":"movie.mkv","blockIdx":3}"#);
        assert!(!req.is_whole_file());
        assert!(BlockRequest::whole_file("a").is_whole_file());
    }

    #[test]
    fn test_heartbeat_parse() {
        let json = format!(
            r#"{{"port":8001,"files":[{{"name":"x.txt","mtime":10,"md5":"{}","blockNum":0}}]}}"#,
            "00".repeat(16)
        );
        let req: HeartbeatRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req.port, 8001);
        assert_eq!(req.files.len(), 1);
        assert_eq!(req.files[0].name, "x.txt");
    }

    #[test]
    fn test_heartbeat_missing_port_rejected() {
        let result: Result<HeartbeatRequest, _> = serde_json::from_str(r#"{"files":[]}"#);
        assert!(result.is_err());
    }
}
