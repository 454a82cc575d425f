//! Process-level configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use filemesh_sync::{SyncConfig, DEFAULT_TRACKER_TIMEOUT};

use crate::error::{FilemeshError, Result};
use crate::port::DEFAULT_BASE_PORT;

/// Configuration for a peer process.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Tracker to send heartbeats to.
    pub tracker_addr: SocketAddr,
    /// Serving directory.
    pub root: PathBuf,
    /// Address the block server binds on.
    pub bind_ip: IpAddr,
    /// Fixed service port. `None` probes upward from [`DEFAULT_BASE_PORT`];
    /// `Some(0)` lets the OS choose.
    pub port: Option<u16>,
    /// Concurrent inbound block requests.
    pub max_connections: usize,
    /// Deadline for one heartbeat exchange.
    pub tracker_timeout: Duration,
    /// Heartbeat, scan, transfer and retry settings. The service port inside
    /// is overwritten with the bound port at startup.
    pub sync: SyncConfig,
}

impl PeerConfig {
    pub fn new(tracker_addr: SocketAddr) -> Self {
        Self {
            tracker_addr,
            root: PathBuf::from("."),
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: None,
            max_connections: 64,
            tracker_timeout: DEFAULT_TRACKER_TIMEOUT,
            sync: SyncConfig::new(DEFAULT_BASE_PORT),
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.sync.scan.block_size = block_size;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.sync.heartbeat_interval = interval;
        self
    }

    /// Reject values that would make the peer misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.sync.scan.block_size == 0 {
            return Err(FilemeshError::InvalidConfig("block size must be positive".into()));
        }
        if self.sync.heartbeat_interval.is_zero() {
            return Err(FilemeshError::InvalidConfig(
                "heartbeat interval must be positive".into(),
            ));
        }
        if self.max_connections == 0 || self.sync.max_parallel_blocks == 0 {
            return Err(FilemeshError::InvalidConfig(
                "concurrency limits must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = PeerConfig::new(tracker());
        assert_eq!(config.sync.scan.block_size, 100 * 1024 * 1024);
        assert_eq!(config.sync.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.sync.transfer.io_timeout, Duration::from_secs(60));
        assert_eq!(config.tracker_timeout, Duration::from_secs(180));
        assert!(config.port.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_block_size() {
        let config = PeerConfig::new(tracker()).with_block_size(0);
        assert!(matches!(
            config.validate(),
            Err(FilemeshError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = PeerConfig::new(tracker()).with_heartbeat_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
