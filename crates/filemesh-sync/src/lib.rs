//! # filemesh sync
//!
//! Everything a peer does over the network: the tracker heartbeat, the
//! block transfer protocol and the engine that ties them to the local store.
//!
//! ## Overview
//!
//! Every heartbeat cycle the [`SyncEngine`] scans its serving directory,
//! reports the inventory to the tracker and receives the cluster directory.
//! Files that are missing locally, or older locally than in the directory,
//! are fetched from their owner: whole at block index 0, or block by block
//! in parallel for partitioned files. Assembled files are verified against
//! the directory's hash before they are moved into the serving directory.
//!
//! ## Key Types
//!
//! - [`SyncEngine`] - heartbeat loop and fetch scheduling
//! - [`TrackerClient`] - seam over the tracker connection
//! - [`RetryPolicy`] - bounded retry with exponential backoff
//! - [`InFlight`] - at most one fetch per filename
//!
//! ## Usage
//!
//! ```rust,no_run
//! use filemesh_store::FileStore;
//! use filemesh_sync::{SyncConfig, SyncEngine, TcpTrackerClient};
//!
//! async fn example() {
//!     let store = FileStore::open("./shared").unwrap();
//!     let client = TcpTrackerClient::new("127.0.0.1:9000".parse().unwrap());
//!     let engine = SyncEngine::new(store, client, SyncConfig::new(8000));
//!
//!     let report = engine.run_cycle().await.unwrap();
//!     for (name, result) in report.wait_all().await {
//!         println!("{name}: {:?}", result.map(|f| f.len));
//!     }
//! }
//! ```
//!
//! ## Wire Format
//!
//! ```text
//! peer                                tracker
//!   |-- frame(HeartbeatRequest) ------->|
//!   |<--------------- frame(Directory) -|
//!
//! peer                                owner
//!   |-- frame(BlockRequest) ----------->|
//!   |<-- hex digest, u64 length, body --|
//! ```
//!
//! A frame is a big-endian `u32` length followed by that many JSON bytes.

pub mod diff;
pub mod engine;
pub mod error;
pub mod in_flight;
pub mod messages;
pub mod protocol;
pub mod retry;
pub mod server;
pub mod transport;

pub use diff::{plan_fetches, PlannedFetch};
pub use engine::{CycleReport, FetchedFile, Fetcher, ScheduledFetch, SyncConfig, SyncEngine};
pub use error::{Result, SyncError};
pub use in_flight::{InFlight, InFlightGuard};
pub use messages::limits;
pub use protocol::{fetch_block, fetch_block_with_retry, serve_block, serve_blocks, FetchedBlock, TransferConfig};
pub use retry::RetryPolicy;
pub use server::{accept_loop, wait_for_shutdown};
pub use transport::{
    read_message, timed, write_message, HeartbeatReply, TcpTrackerClient, TrackerClient,
    DEFAULT_TRACKER_TIMEOUT,
};
