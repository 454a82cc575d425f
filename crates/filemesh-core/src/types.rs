//! Strong type definitions for filemesh.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::error::{CoreError, Result};
use crate::hash::ContentHash;

/// Identity of a peer: the address it is reachable at plus its service port.
///
/// The tracker takes the ip from the connection source and the port from the
/// heartbeat payload, so two peer processes on one host stay distinct.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId {
    pub ip: IpAddr,
    pub port: u16,
}

impl PeerId {
    pub const fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Address of the peer's block-serving listener.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.socket_addr())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

impl From<SocketAddr> for PeerId {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

/// One file of a peer's local inventory, as reported in a heartbeat.
///
/// Recomputed on every heartbeat cycle, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Bare file name inside the serving directory.
    pub name: String,
    /// Modification time, Unix seconds.
    pub mtime: i64,
    /// Digest of the whole file.
    #[serde(rename = "md5")]
    pub hash: ContentHash,
    /// Number of blocks the peer has materialized, 0 when unpartitioned.
    #[serde(rename = "blockNum")]
    pub block_count: u64,
}

/// The tracker's directory entry for a filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Owning peer's address.
    pub ip: IpAddr,
    /// Owning peer's service port.
    pub port: u16,
    /// Modification time, Unix seconds.
    pub mtime: i64,
    /// Digest of the whole file.
    #[serde(rename = "md5")]
    pub hash: ContentHash,
    /// Number of blocks at the owner, 0 when the file is fetched whole.
    #[serde(rename = "blockNum")]
    pub block_count: u64,
}

impl FileRecord {
    /// Build a record owned by `owner` from a reported inventory entry.
    pub fn from_entry(owner: PeerId, entry: &FileEntry) -> Self {
        Self {
            ip: owner.ip,
            port: owner.port,
            mtime: entry.mtime,
            hash: entry.hash,
            block_count: entry.block_count,
        }
    }

    /// The peer that owns this record.
    pub fn owner(&self) -> PeerId {
        PeerId::new(self.ip, self.port)
    }

    /// Whether the file is transferred as numbered blocks.
    pub fn is_partitioned(&self) -> bool {
        self.block_count > 0
    }
}

/// Cluster-wide directory: filename to authoritative record.
///
/// A flat namespace, ordered so that snapshots serialize deterministically.
pub type Directory = BTreeMap<String, FileRecord>;

/// Number of blocks a file of `size` bytes splits into.
///
/// `size / block_size`, plus one when there is a remainder.
pub fn block_count_for_size(size: u64, block_size: u64) -> Result<u64> {
    if block_size == 0 {
        return Err(CoreError::ZeroBlockSize);
    }
    let full = size / block_size;
    Ok(if size % block_size == 0 { full } else { full + 1 })
}
