//! # filemesh store
//!
//! The on-disk side of a peer: its serving directory and the block cache
//! that lives inside it.
//!
//! ## Overview
//!
//! Original files sit directly in the serving directory. Files at or above
//! the block size are split into blocks stored in the `MEtemp` subdirectory
//! as `<name>_PART<index>`, indices starting at 1. Downloads are staged in
//! the same subdirectory and only moved into the serving directory once
//! their content hash has been verified.
//!
//! ## Key Types
//!
//! - [`FileStore`] - path resolution and file lifecycle for one serving directory
//! - [`ScanConfig`] - block size and ignored extensions for inventory scans
//! - [`Partition`] - outcome of splitting a file into blocks
//!
//! ## Usage
//!
//! ```rust,no_run
//! use filemesh_store::{FileStore, ScanConfig};
//!
//! let store = FileStore::open("./shared").unwrap();
//! let inventory = store.scan(&ScanConfig::default()).unwrap();
//! for entry in inventory {
//!     println!("{} {} blocks={}", entry.name, entry.hash, entry.block_count);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - Everything here is blocking `std::fs` I/O. Async callers run it on
//!   `spawn_blocking`.
//! - **Idempotent partition**: an existing, up-to-date first block means the
//!   file is already split.
//! - **Deletion is tolerant**: removing blocks that are already gone is not
//!   an error.

pub mod chunk;
pub mod error;
pub mod fs_store;
pub mod hashing;
pub mod inventory;

pub use chunk::{
    block_count, block_path, block_prefix, delete_blocks, merge, partition, Partition,
    BLOCK_CACHE_DIR, BLOCK_SUFFIX,
};
pub use error::{Result, StoreError};
pub use fs_store::{set_mtime, unix_mtime, FileStore};
pub use hashing::hash_file;
pub use inventory::{ScanConfig, DEFAULT_BLOCK_SIZE, DEFAULT_IGNORED_EXTENSIONS};
