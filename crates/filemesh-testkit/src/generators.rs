//! Proptest generators for property-based testing.

use std::net::{IpAddr, Ipv4Addr};

use proptest::prelude::*;

use filemesh_core::{ContentHash, FileEntry, HeartbeatRequest, PeerId};

/// Generate a valid bare file name.
pub fn file_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,11}\\.(txt|bin|dat|md)"
}

/// Generate a random ContentHash.
pub fn content_hash() -> impl Strategy<Value = ContentHash> {
    any::<[u8; 16]>().prop_map(ContentHash::from_bytes)
}

/// Generate a loopback-range peer identity.
pub fn peer_id() -> impl Strategy<Value = PeerId> {
    (1u8..=254, 1024u16..=u16::MAX)
        .prop_map(|(host, port)| PeerId::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, host)), port))
}

/// Generate a plausible modification time.
pub fn mtime() -> impl Strategy<Value = i64> {
    0i64..=4_102_444_800
}

/// Generate one inventory entry.
pub fn file_entry() -> impl Strategy<Value = FileEntry> {
    (file_name(), mtime(), content_hash(), 0u64..16).prop_map(|(name, mtime, hash, block_count)| {
        FileEntry {
            name,
            mtime,
            hash,
            block_count,
        }
    })
}

/// Generate a heartbeat with up to `max_files` distinct file names.
pub fn heartbeat(max_files: usize) -> impl Strategy<Value = HeartbeatRequest> {
    (
        1024u16..=u16::MAX,
        proptest::collection::btree_map(file_name(), (mtime(), content_hash()), 0..=max_files),
    )
        .prop_map(|(port, files)| HeartbeatRequest {
            port,
            files: files
                .into_iter()
                .map(|(name, (mtime, hash))| FileEntry {
                    name,
                    mtime,
                    hash,
                    block_count: 0,
                })
                .collect(),
        })
}

/// Generate file contents paired with a block size that splits them.
pub fn contents_and_block_size() -> impl Strategy<Value = (Vec<u8>, u64)> {
    (proptest::collection::vec(any::<u8>(), 1..4096), 1u64..1024)
}
