//! # filemesh tracker
//!
//! Directory service for a filemesh cluster. Stores no file content.
//!
//! ## Overview
//!
//! Peers send a heartbeat carrying their service port and full inventory.
//! The tracker refreshes the peer's liveness, merges the inventory into its
//! file directory and answers with the whole directory. A periodic sweep
//! evicts peers that stopped sending heartbeats, together with every record
//! they own.
//!
//! ## Merge rule
//!
//! The first report of a filename creates its record. Later reports replace
//! it according to the configured [`MergePolicy`]. The default,
//! [`MergePolicy::ReplaceWhenOlder`], replaces a record when its mtime is
//! strictly greater than the reported one. [`MergePolicy::KeepNewest`]
//! inverts the comparison.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use filemesh_tracker::{bind, run, TrackerConfig, TrackerState};
//!
//! async fn example() {
//!     let config = TrackerConfig::default();
//!     let listener = bind("0.0.0.0:9000".parse().unwrap()).await.unwrap();
//!     let state = Arc::new(TrackerState::new(config.merge_policy));
//!     let (_stop, shutdown) = tokio::sync::watch::channel(false);
//!     run(listener, state, config, shutdown).await;
//! }
//! ```

pub mod error;
pub mod server;
pub mod state;

pub use error::{Result, TrackerError};
pub use server::{bind, handle_connection, run, run_sweeper, serve, TrackerConfig};
pub use state::{MergePolicy, MergeSummary, TrackerState};
