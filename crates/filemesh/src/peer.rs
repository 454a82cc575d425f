//! A running peer: block server plus heartbeat loop.

use std::net::SocketAddr;
use std::sync::Arc;

use filemesh_store::FileStore;
use filemesh_sync::{serve_blocks, SyncEngine, TcpTrackerClient};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::config::PeerConfig;
use crate::error::{FilemeshError, Result};
use crate::port::{next_available_port, DEFAULT_BASE_PORT};

/// A peer whose listener is bound and whose engine is ready to run.
pub struct Peer {
    listener: TcpListener,
    /// Address the listener was bound with.
    addr: SocketAddr,
    engine: Arc<SyncEngine<TcpTrackerClient>>,
    max_connections: usize,
}

impl Peer {
    /// Open the serving directory and bind the block server.
    ///
    /// A bind failure is returned as [`FilemeshError::Bind`]; callers treat
    /// it as fatal.
    pub async fn bind(config: PeerConfig) -> Result<Self> {
        config.validate()?;
        let store = FileStore::open(&config.root)?;

        let port = match config.port {
            Some(port) => port,
            None => next_available_port(DEFAULT_BASE_PORT)?,
        };
        let addr = SocketAddr::new(config.bind_ip, port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(bind_error(addr))?;
        let local = listener.local_addr().map_err(bind_error(addr))?;

        let mut sync = config.sync.clone();
        sync.service_port = local.port();
        let client =
            TcpTrackerClient::new(config.tracker_addr).with_timeout(config.tracker_timeout);
        info!(
            root = %store.root().display(),
            addr = %local,
            tracker = %config.tracker_addr,
            "peer bound"
        );

        Ok(Self {
            listener,
            addr,
            engine: Arc::new(SyncEngine::new(store, client, sync)),
            max_connections: config.max_connections,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(bind_error(self.addr))
    }

    pub fn engine(&self) -> &Arc<SyncEngine<TcpTrackerClient>> {
        &self.engine
    }

    /// Serve blocks and run heartbeat cycles until `shutdown` flips.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let store = Arc::clone(self.engine.store());
        let transfer = self.engine.config().transfer.clone();
        let engine = Arc::clone(&self.engine);
        tokio::join!(
            serve_blocks(
                self.listener,
                store,
                transfer,
                self.max_connections,
                shutdown.clone()
            ),
            engine.run(shutdown),
        );
        info!("peer stopped");
    }
}

fn bind_error(addr: SocketAddr) -> impl FnOnce(std::io::Error) -> FilemeshError {
    move |source| FilemeshError::Bind { addr, source }
}
