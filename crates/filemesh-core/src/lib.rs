//! # filemesh core
//!
//! Pure primitives shared by the tracker and the peers.
//!
//! This crate contains no I/O, no storage, no networking. It defines the
//! identities, records and payloads that flow between the processes.
//!
//! ## Key Types
//!
//! - [`PeerId`] - (ip, service port) pair identifying a peer
//! - [`ContentHash`] - 128-bit content digest, rendered as 32 hex characters
//! - [`FileEntry`] - one file of a peer's local inventory
//! - [`FileRecord`] - the tracker's directory entry for a filename
//! - [`Directory`] - filename to [`FileRecord`] mapping
//! - [`HeartbeatRequest`] / [`BlockRequest`] - wire payloads
//!
//! ## Blocks
//!
//! Files at or above the block size are split into fixed-size blocks,
//! numbered from 1. Block index 0 always means "the whole file". See
//! [`block_count_for_size`].

pub mod error;
pub mod hash;
pub mod messages;
pub mod types;
pub mod validation;

pub use error::{CoreError, Result};
pub use hash::{ContentHash, ContentHasher, DIGEST_HEX_LEN, DIGEST_LEN};
pub use messages::{BlockIndex, BlockRequest, HeartbeatRequest, WHOLE_FILE};
pub use types::{block_count_for_size, Directory, FileEntry, FileRecord, PeerId};
pub use validation::validate_file_name;
