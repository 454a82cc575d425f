//! # filemesh testkit
//!
//! Testing utilities for filemesh.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: temporary serving directories with files at chosen mtimes
//! - **Generators**: Proptest strategies for names, entries and heartbeats
//! - **In-process tracker**: a [`TrackerClient`](filemesh_sync::TrackerClient)
//!   backed directly by tracker state
//!
//! ## Test Fixtures
//!
//! ```rust
//! use filemesh_testkit::fixtures::ServingDir;
//!
//! let dir = ServingDir::new();
//! dir.write_file("notes.txt", b"hello", 1_700_000_000);
//! assert_eq!(dir.mtime("notes.txt"), Some(1_700_000_000));
//! ```

pub mod fixtures;
pub mod generators;
pub mod tracker;

pub use fixtures::{random_bytes, ServingDir};
pub use tracker::InProcessTracker;
