//! Peer synchronization engine.
//!
//! One engine per peer process. Each heartbeat cycle scans the serving
//! directory, reports it to the tracker, diffs the returned directory against
//! the local inventory and spawns one fetch task per needed file. The
//! in-flight set keeps at most one fetch per filename alive.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use filemesh_core::{BlockRequest, FileRecord, HeartbeatRequest, PeerId};
use filemesh_store::{hash_file, merge, FileStore, ScanConfig, StoreError};
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::diff::{plan_fetches, PlannedFetch};
use crate::error::{Result, SyncError};
use crate::in_flight::InFlight;
use crate::protocol::{fetch_block_with_retry, TransferConfig};
use crate::retry::RetryPolicy;
use crate::server::wait_for_shutdown;
use crate::transport::TrackerClient;

/// Peer-side synchronization settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Port this peer serves blocks on, reported in every heartbeat.
    pub service_port: u16,
    /// Delay between heartbeat cycles.
    pub heartbeat_interval: Duration,
    pub scan: ScanConfig,
    pub transfer: TransferConfig,
    /// Retry policy for each single block (or whole-file) transfer.
    pub block_retry: RetryPolicy,
    /// Retry policy for a complete file, applied when the assembled file
    /// does not match the directory's hash.
    pub file_retry: RetryPolicy,
    /// Concurrent block transfers per file.
    pub max_parallel_blocks: usize,
}

impl SyncConfig {
    pub fn new(service_port: u16) -> Self {
        Self {
            service_port,
            heartbeat_interval: Duration::from_secs(5),
            scan: ScanConfig::default(),
            transfer: TransferConfig::default(),
            block_retry: RetryPolicy::default(),
            file_retry: RetryPolicy::default(),
            max_parallel_blocks: 8,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(8000)
    }
}

/// A file that was fetched, verified and installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    pub name: String,
    pub path: PathBuf,
    pub len: u64,
    pub block_count: u64,
}

/// A fetch task spawned by a heartbeat cycle.
#[derive(Debug)]
pub struct ScheduledFetch {
    pub name: String,
    pub handle: JoinHandle<Result<FetchedFile>>,
}

/// What one heartbeat cycle did.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Files reported to the tracker.
    pub local_files: usize,
    /// Records in the directory the tracker returned.
    pub directory_size: usize,
    pub scheduled: Vec<ScheduledFetch>,
    /// Needed files not scheduled because a fetch is already running.
    pub skipped_in_flight: Vec<String>,
}

impl CycleReport {
    pub fn scheduled_names(&self) -> Vec<&str> {
        self.scheduled.iter().map(|s| s.name.as_str()).collect()
    }

    /// Wait for every fetch this cycle spawned.
    pub async fn wait_all(self) -> Vec<(String, Result<FetchedFile>)> {
        let mut results = Vec::with_capacity(self.scheduled.len());
        for scheduled in self.scheduled {
            let result = match scheduled.handle.await {
                Ok(result) => result,
                Err(e) => Err(e.into()),
            };
            results.push((scheduled.name, result));
        }
        results
    }
}

/// The heartbeat loop of a peer.
pub struct SyncEngine<C> {
    store: Arc<FileStore>,
    client: C,
    config: Arc<SyncConfig>,
    in_flight: InFlight,
    fetcher: Fetcher,
}

impl<C: TrackerClient> SyncEngine<C> {
    pub fn new(store: FileStore, client: C, config: SyncConfig) -> Self {
        let store = Arc::new(store);
        let config = Arc::new(config);
        let fetcher = Fetcher::new(Arc::clone(&store), Arc::clone(&config));
        Self {
            store,
            client,
            config,
            in_flight: InFlight::new(),
            fetcher,
        }
    }

    pub fn store(&self) -> &Arc<FileStore> {
        &self.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Run one heartbeat cycle.
    ///
    /// Fetch tasks are spawned detached; the report carries their handles.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let files = {
            let store = Arc::clone(&self.store);
            let scan = self.config.scan.clone();
            tokio::task::spawn_blocking(move || store.scan(&scan)).await??
        };

        let request = HeartbeatRequest {
            port: self.config.service_port,
            files,
        };
        let reply = self.client.heartbeat(&request).await?;
        let self_id = reply
            .observed_ip
            .map(|ip| PeerId::new(ip, self.config.service_port));

        let mut report = CycleReport {
            local_files: request.files.len(),
            directory_size: reply.directory.len(),
            ..CycleReport::default()
        };

        for planned in plan_fetches(&reply.directory, &request.files, self_id) {
            let Some(guard) = self.in_flight.try_claim(&planned.name) else {
                debug!(name = %planned.name, "fetch already in flight");
                report.skipped_in_flight.push(planned.name);
                continue;
            };

            info!(
                name = %planned.name,
                owner = %planned.record.owner(),
                blocks = planned.record.block_count,
                "scheduling fetch"
            );
            let name = planned.name.clone();
            let fetcher = self.fetcher.clone();
            let handle = tokio::spawn(async move {
                let _guard = guard;
                fetcher.replace(planned).await
            });
            report.scheduled.push(ScheduledFetch { name, handle });
        }

        Ok(report)
    }

    /// Run heartbeat cycles until `shutdown` flips.
    ///
    /// Cycles never overlap; ticks missed while a cycle runs are skipped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            root = %self.store.root().display(),
            port = self.config.service_port,
            interval = ?self.config.heartbeat_interval,
            "heartbeat loop started"
        );

        loop {
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break,
                result = self.run_cycle() => match result {
                    Ok(report) => debug!(
                        local = report.local_files,
                        directory = report.directory_size,
                        scheduled = report.scheduled.len(),
                        in_flight = report.skipped_in_flight.len(),
                        "heartbeat cycle done"
                    ),
                    Err(e) => warn!(error = %e, "heartbeat cycle failed"),
                },
            }
        }

        info!("heartbeat loop stopped");
    }
}

/// Downloads files into one store. Cheap to clone into fetch tasks.
#[derive(Clone)]
pub struct Fetcher {
    store: Arc<FileStore>,
    config: Arc<SyncConfig>,
}

impl Fetcher {
    pub fn new(store: Arc<FileStore>, config: Arc<SyncConfig>) -> Self {
        Self { store, config }
    }

    /// Delete the stale local copy, if any, then fetch the replacement.
    pub async fn replace(&self, planned: PlannedFetch) -> Result<FetchedFile> {
        if planned.stale_local.is_some() {
            let clear = planned.blocks_to_clear();
            self.blocking({
                let name = planned.name.clone();
                move |store| store.remove_file_and_blocks(&name, clear)
            })
            .await?;
            debug!(name = %planned.name, blocks = clear, "removed stale local copy");
        }
        self.fetch_file(&planned.name, &planned.record).await
    }

    /// Fetch `name` as described by `record`, retrying the whole file when
    /// the assembled content does not match the record's hash.
    pub async fn fetch_file(&self, name: &str, record: &FileRecord) -> Result<FetchedFile> {
        let result = self
            .config
            .file_retry
            .run(name, move |attempt| async move {
                if attempt > 1 {
                    debug!(name, attempt, "refetching file");
                }
                self.fetch_once(name, record).await
            })
            .await;

        match &result {
            Ok(fetched) => info!(name, bytes = fetched.len, blocks = fetched.block_count, "fetched file"),
            Err(e) => error!(name, owner = %record.owner(), error = %e, "giving up on file"),
        }
        result
    }

    async fn fetch_once(&self, name: &str, record: &FileRecord) -> Result<FetchedFile> {
        let result = self.fetch_once_inner(name, record).await;
        if result.is_err() {
            let count = record.block_count;
            let owned = name.to_string();
            let cleanup = self
                .blocking(move |store| {
                    store.discard_staging(&owned)?;
                    filemesh_store::delete_blocks(&store.file_path(&owned)?, count)?;
                    Ok(())
                })
                .await;
            if let Err(e) = cleanup {
                warn!(name, error = %e, "failed to clean up after fetch");
            }
        }
        result
    }

    async fn fetch_once_inner(&self, name: &str, record: &FileRecord) -> Result<FetchedFile> {
        let peer = record.owner().socket_addr();
        let staging = self.store.staging_path(name)?;
        self.blocking(|store| store.ensure_cache_dir()).await?;

        if record.is_partitioned() {
            self.fetch_blocks(peer, name, record.block_count).await?;
            let owned = name.to_string();
            let count = record.block_count;
            self.blocking(move |store| {
                let prefix = store.block_prefix(&owned)?;
                let staging = store.staging_path(&owned)?;
                merge(&prefix, &staging, count)
            })
            .await?;
        } else {
            fetch_block_with_retry(
                peer,
                &BlockRequest::whole_file(name),
                &staging,
                &self.config.transfer,
                &self.config.block_retry,
            )
            .await?;
        }

        let actual = {
            let staging = staging.clone();
            tokio::task::spawn_blocking(move || hash_file(&staging)).await??
        };
        if actual != record.hash {
            return Err(SyncError::IntegrityFailure {
                what: name.to_string(),
                expected: record.hash,
                actual,
            });
        }

        let owned = name.to_string();
        let mtime = record.mtime;
        let path = self.blocking(move |store| store.install(&owned, mtime)).await?;
        let len = tokio::fs::metadata(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?
            .len();

        Ok(FetchedFile {
            name: name.to_string(),
            path,
            len,
            block_count: record.block_count,
        })
    }

    /// Fetch blocks `1..=count` concurrently into the block cache.
    async fn fetch_blocks(&self, peer: SocketAddr, name: &str, count: u64) -> Result<()> {
        let limiter = Arc::new(Semaphore::new(self.config.max_parallel_blocks.max(1)));
        let mut tasks = JoinSet::new();

        for index in 1..=count {
            let dest = self.store.block_path(name, index)?;
            let request = BlockRequest::new(name, index);
            let limiter = Arc::clone(&limiter);
            let config = Arc::clone(&self.config);
            tasks.spawn(async move {
                let _permit = limiter
                    .acquire_owned()
                    .await
                    .map_err(|_| SyncError::TaskFailed("block limiter closed".into()))?;
                fetch_block_with_retry(peer, &request, &dest, &config.transfer, &config.block_retry)
                    .await
            });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(result) => result.map(|_| ()),
                Err(e) if e.is_cancelled() => continue,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = outcome {
                if first_error.is_none() {
                    tasks.abort_all();
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Run a blocking store operation off the async workers.
    async fn blocking<F, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&FileStore) -> std::result::Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        Ok(tokio::task::spawn_blocking(move || op(&store)).await??)
    }
}
