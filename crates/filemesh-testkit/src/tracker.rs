//! In-process tracker client.
//!
//! Routes heartbeats straight into a [`TrackerState`] without sockets, so
//! engine tests can run several peers against one shared directory.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use async_trait::async_trait;
use filemesh_core::HeartbeatRequest;
use filemesh_sync::{HeartbeatReply, Result, TrackerClient};
use filemesh_tracker::TrackerState;

/// A [`TrackerClient`] that applies heartbeats to shared state directly.
#[derive(Clone)]
pub struct InProcessTracker {
    state: Arc<TrackerState>,
    source_ip: IpAddr,
}

impl InProcessTracker {
    /// Client reporting from `127.0.0.1`.
    pub fn new(state: Arc<TrackerState>) -> Self {
        Self::with_source_ip(state, IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    pub fn with_source_ip(state: Arc<TrackerState>, source_ip: IpAddr) -> Self {
        Self { state, source_ip }
    }

    pub fn state(&self) -> &Arc<TrackerState> {
        &self.state
    }
}

#[async_trait]
impl TrackerClient for InProcessTracker {
    async fn heartbeat(&self, request: &HeartbeatRequest) -> Result<HeartbeatReply> {
        Ok(HeartbeatReply {
            directory: self.state.handle_heartbeat(self.source_ip, request),
            observed_ip: Some(self.source_ip),
        })
    }
}
