//! Command-line arguments for the two binaries.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use filemesh_tracker::{MergePolicy, TrackerConfig};

use crate::config::PeerConfig;

const MIB: u64 = 1024 * 1024;

/// filemesh tracker: peer liveness and file directory service
#[derive(Debug, Parser)]
#[command(name = "filemesh-tracker", version)]
pub struct TrackerArgs {
    /// IPv4 address to listen on
    pub ip: Ipv4Addr,
    /// Port to listen on
    pub port: u16,
    /// Replace a directory record only with a newer report
    #[arg(long)]
    pub keep_newest: bool,
    /// Seconds without a heartbeat before a peer is evicted
    #[arg(long, default_value_t = 180, value_parser = clap::value_parser!(u64).range(1..))]
    pub ttl_secs: u64,
    /// Seconds between liveness sweeps
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u64).range(1..))]
    pub sweep_secs: u64,
}

impl TrackerArgs {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(self.ip), self.port)
    }

    pub fn config(&self) -> TrackerConfig {
        TrackerConfig {
            peer_ttl: Duration::from_secs(self.ttl_secs),
            sweep_interval: Duration::from_secs(self.sweep_secs),
            merge_policy: if self.keep_newest {
                MergePolicy::KeepNewest
            } else {
                MergePolicy::ReplaceWhenOlder
            },
            ..TrackerConfig::default()
        }
    }
}

/// filemesh peer: keep a directory in sync with the rest of the cluster
#[derive(Debug, Parser)]
#[command(name = "filemesh-peer", version)]
pub struct PeerArgs {
    /// IPv4 address of the tracker
    pub tracker_ip: Ipv4Addr,
    /// Port of the tracker
    pub tracker_port: u16,
    /// Directory to share
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,
    /// Files at or above this size (MiB) are transferred in blocks
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..))]
    pub block_size_mb: u64,
    /// Service port; probes upward from 8000 when omitted
    #[arg(long)]
    pub port: Option<u16>,
    /// Seconds between heartbeats
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub heartbeat_secs: u64,
}

impl PeerArgs {
    pub fn tracker_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(self.tracker_ip), self.tracker_port)
    }

    pub fn config(&self) -> PeerConfig {
        let mut config = PeerConfig::new(self.tracker_addr())
            .with_root(self.dir.clone())
            .with_block_size(self.block_size_mb * MIB)
            .with_heartbeat_interval(Duration::from_secs(self.heartbeat_secs));
        config.port = self.port;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_args() {
        let args = TrackerArgs::try_parse_from(["filemesh-tracker", "127.0.0.1", "9000"]).unwrap();
        assert_eq!(args.addr(), "127.0.0.1:9000".parse().unwrap());
        let config = args.config();
        assert_eq!(config.merge_policy, MergePolicy::ReplaceWhenOlder);
        assert_eq!(config.peer_ttl, Duration::from_secs(180));
        assert_eq!(config.sweep_interval, Duration::from_secs(20));
    }

    #[test]
    fn test_tracker_keep_newest() {
        let args = TrackerArgs::try_parse_from([
            "filemesh-tracker",
            "0.0.0.0",
            "9000",
            "--keep-newest",
            "--ttl-secs",
            "30",
        ])
        .unwrap();
        let config = args.config();
        assert_eq!(config.merge_policy, MergePolicy::KeepNewest);
        assert_eq!(config.peer_ttl, Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_bad_ip() {
        for ip in ["256.0.0.1", "1.2.3", "a.b.c.d", "1.2.3.4.5"] {
            assert!(
                TrackerArgs::try_parse_from(["filemesh-tracker", ip, "9000"]).is_err(),
                "{ip} accepted"
            );
        }
    }

    #[test]
    fn test_rejects_bad_port() {
        for port in ["65536", "-1", "port"] {
            assert!(
                PeerArgs::try_parse_from(["filemesh-peer", "10.0.0.1", port]).is_err(),
                "{port} accepted"
            );
        }
        assert!(PeerArgs::try_parse_from(["filemesh-peer", "10.0.0.1", "65535"]).is_ok());
        assert!(PeerArgs::try_parse_from(["filemesh-peer", "10.0.0.1", "0"]).is_ok());
    }

    #[test]
    fn test_missing_positionals() {
        assert!(PeerArgs::try_parse_from(["filemesh-peer", "10.0.0.1"]).is_err());
    }

    #[test]
    fn test_peer_args_config() {
        let args = PeerArgs::try_parse_from([
            "filemesh-peer",
            "10.0.0.1",
            "9000",
            "--dir",
            "/srv/share",
            "--block-size-mb",
            "4",
            "--port",
            "8100",
        ])
        .unwrap();
        let config = args.config();
        assert_eq!(config.tracker_addr, "10.0.0.1:9000".parse().unwrap());
        assert_eq!(config.root, PathBuf::from("/srv/share"));
        assert_eq!(config.sync.scan.block_size, 4 * MIB);
        assert_eq!(config.port, Some(8100));
    }
}
