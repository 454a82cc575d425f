//! Tracker network service and liveness sweeper.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use filemesh_core::HeartbeatRequest;
use filemesh_sync::{accept_loop, limits, read_message, timed, wait_for_shutdown, write_message};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{Result, TrackerError};
use crate::state::{MergePolicy, TrackerState};

/// Tracker settings.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Deadline for one whole heartbeat exchange.
    pub connection_timeout: Duration,
    /// Peers silent for longer than this are evicted.
    pub peer_ttl: Duration,
    /// Period of the liveness sweep.
    pub sweep_interval: Duration,
    /// Concurrent connections served.
    pub max_connections: usize,
    pub merge_policy: MergePolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(180),
            peer_ttl: Duration::from_secs(180),
            sweep_interval: Duration::from_secs(20),
            max_connections: 256,
            merge_policy: MergePolicy::default(),
        }
    }
}

/// Bind the tracker's listening socket.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| TrackerError::Bind { addr, source })
}

/// Handle one heartbeat connection: read the request, merge it, answer with
/// the directory.
///
/// A request that fails to arrive or parse leaves the state untouched.
pub async fn handle_connection(
    mut stream: TcpStream,
    remote: SocketAddr,
    state: &TrackerState,
    config: &TrackerConfig,
) -> Result<()> {
    timed(config.connection_timeout, "heartbeat exchange", async {
        let request: HeartbeatRequest = read_message(&mut stream, limits::MAX_FRAME_LEN).await?;
        debug!(%remote, port = request.port, files = request.files.len(), "heartbeat");
        let directory = state.handle_heartbeat(remote.ip(), &request);
        write_message(&mut stream, &directory).await
    })
    .await?;
    Ok(())
}

/// Serve heartbeats until shutdown.
pub async fn serve(
    listener: TcpListener,
    state: Arc<TrackerState>,
    config: Arc<TrackerConfig>,
    shutdown: watch::Receiver<bool>,
) {
    let max = config.max_connections;
    accept_loop(listener, max, shutdown, move |stream, remote| {
        let state = Arc::clone(&state);
        let config = Arc::clone(&config);
        async move {
            if let Err(e) = handle_connection(stream, remote, &state, &config).await {
                warn!(%remote, error = %e, "heartbeat connection failed");
            }
        }
    })
    .await
}

/// Evict silent peers every `sweep_interval` until shutdown.
pub async fn run_sweeper(
    state: Arc<TrackerState>,
    config: Arc<TrackerConfig>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(config.sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => break,
            _ = ticker.tick() => {
                state.sweep_at(Instant::now(), config.peer_ttl);
            }
        }
    }
    debug!("sweeper stopped");
}

/// Run the service and the sweeper together until shutdown.
pub async fn run(
    listener: TcpListener,
    state: Arc<TrackerState>,
    config: TrackerConfig,
    shutdown: watch::Receiver<bool>,
) {
    let config = Arc::new(config);
    info!(
        addr = ?listener.local_addr().ok(),
        policy = ?config.merge_policy,
        ttl = ?config.peer_ttl,
        "tracker running"
    );
    tokio::join!(
        serve(listener, Arc::clone(&state), Arc::clone(&config), shutdown.clone()),
        run_sweeper(state, config, shutdown),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use filemesh_core::{ContentHash, Directory, FileEntry};
    use filemesh_sync::transport::write_frame;
    use filemesh_sync::{HeartbeatReply, TcpTrackerClient, TrackerClient};
    use tokio::io::AsyncReadExt;

    async fn start(config: TrackerConfig) -> (SocketAddr, Arc<TrackerState>, watch::Sender<bool>) {
        let listener = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(TrackerState::new(config.merge_policy));
        let (tx, rx) = watch::channel(false);
        tokio::spawn(run(listener, Arc::clone(&state), config, rx));
        (addr, state, tx)
    }

    fn report(port: u16, name: &str, mtime: i64) -> HeartbeatRequest {
        HeartbeatRequest {
            port,
            files: vec![FileEntry {
                name: name.into(),
                mtime,
                hash: ContentHash::hash(name.as_bytes()),
                block_count: 0,
            }],
        }
    }

    #[tokio::test]
    async fn test_heartbeat_over_tcp() {
        let (addr, state, _stop) = start(TrackerConfig::default()).await;
        let client = TcpTrackerClient::new(addr);

        let HeartbeatReply { directory, .. } =
            client.heartbeat(&report(8001, "x.txt", 10)).await.unwrap();
        assert_eq!(directory["x.txt"].port, 8001);
        assert_eq!(directory["x.txt"].ip.to_string(), "127.0.0.1");

        let reply = client.heartbeat(&report(8002, "x.txt", 5)).await.unwrap();
        assert_eq!(reply.directory["x.txt"].port, 8002);
        assert_eq!(state.peer_count(), 2);
    }

    #[tokio::test]
    async fn test_malformed_heartbeat_leaves_state_untouched() {
        let (addr, state, _stop) = start(TrackerConfig::default()).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        write_frame(&mut stream, br#"{"files":[]}"#).await.unwrap();
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        write_frame(&mut stream, b"\x00garbage").await.unwrap();
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        assert_eq!(state.peer_count(), 0);
        assert_eq!(state.directory(), Directory::new());
    }

    #[tokio::test]
    async fn test_idle_connection_times_out() {
        let config = TrackerConfig {
            connection_timeout: Duration::from_millis(50),
            ..TrackerConfig::default()
        };
        let (addr, state, _stop) = start(config).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut rest = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();
        assert!(rest.is_empty());

        // The service keeps accepting after a timeout.
        let reply = TcpTrackerClient::new(addr)
            .heartbeat(&report(8001, "a.txt", 1))
            .await
            .unwrap();
        assert_eq!(reply.directory.len(), 1);
        assert_eq!(state.peer_count(), 1);
    }

    #[tokio::test]
    async fn test_sweeper_evicts_silent_peer() {
        let config = TrackerConfig {
            peer_ttl: Duration::from_millis(50),
            sweep_interval: Duration::from_millis(20),
            ..TrackerConfig::default()
        };
        let (addr, state, _stop) = start(config).await;

        TcpTrackerClient::new(addr)
            .heartbeat(&report(8001, "a.txt", 1))
            .await
            .unwrap();
        assert_eq!(state.directory().len(), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(state.peer_count(), 0);
        assert!(state.directory().is_empty());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();
        assert!(matches!(bind(addr).await, Err(TrackerError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let listener = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(run(
            listener,
            Arc::new(TrackerState::default()),
            TrackerConfig::default(),
            rx,
        ));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
