//! # filemesh
//!
//! Tracker-coordinated synchronization of flat file directories across
//! peers.
//!
//! ## Overview
//!
//! A cluster has one tracker and any number of peers. Each peer serves its
//! directory to the others and fetches whatever it is missing or holds an
//! older copy of. The tracker only knows who owns which file; content flows
//! directly between peers, in parallel blocks for large files.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use filemesh::{Peer, PeerConfig};
//!
//! async fn example() {
//!     let config = PeerConfig::new("127.0.0.1:9000".parse().unwrap()).with_root("./shared");
//!     let peer = Peer::bind(config).await.unwrap();
//!     let (_stop, shutdown) = tokio::sync::watch::channel(false);
//!     peer.run(shutdown).await;
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `filemesh::core` - identities, records and wire payloads
//! - `filemesh::store` - serving directory and block cache
//! - `filemesh::sync` - transfer protocol and synchronization engine
//! - `filemesh::tracker` - directory service

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod peer;
pub mod port;

pub use filemesh_core as core;
pub use filemesh_store as store;
pub use filemesh_sync as sync;
pub use filemesh_tracker as tracker;

pub use cli::{PeerArgs, TrackerArgs};
pub use config::PeerConfig;
pub use error::{FilemeshError, Result};
pub use logging::init_logging;
pub use peer::Peer;
pub use port::{next_available_port, DEFAULT_BASE_PORT};
