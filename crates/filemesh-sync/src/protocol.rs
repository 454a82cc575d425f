//! Peer-to-peer block transfer.
//!
//! A fetch is one TCP connection carrying one request:
//!
//! ```text
//! requester                          server
//!     | -- frame(BlockRequest) ------> |
//!     | <----- 32 ASCII hex digest --- |
//!     | <----- u64 BE body length ---- |
//!     | <----- body bytes ------------ |
//!     |                         close  |
//! ```
//!
//! The requester hashes the body while writing it to disk and discards the
//! file when the digest or the length disagree with the header.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use filemesh_core::{BlockRequest, ContentHash, ContentHasher, DIGEST_HEX_LEN};
use filemesh_store::{hash_file, FileStore, StoreError};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::messages::limits;
use crate::retry::RetryPolicy;
use crate::server::accept_loop;
use crate::transport::{read_message, timed, write_message};

/// Timeouts and buffer sizes for block transfers.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Deadline for each individual read, write or connect.
    pub io_timeout: Duration,
    /// Bytes moved per read/write step.
    pub chunk_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            io_timeout: Duration::from_secs(60),
            chunk_size: 64 * 1024,
        }
    }
}

/// A block that arrived intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchedBlock {
    pub hash: ContentHash,
    pub len: u64,
}

/// Answer one block request on `stream`. Returns the body bytes sent.
pub async fn serve_block(
    mut stream: TcpStream,
    store: &FileStore,
    config: &TransferConfig,
) -> Result<u64> {
    let request: BlockRequest = timed(
        config.io_timeout,
        "block request",
        read_message(&mut stream, limits::MAX_BLOCK_REQUEST_LEN),
    )
    .await?;

    let path = store.resolve(&request.name, request.block_idx)?;
    let (hash, len) = {
        let path = path.clone();
        tokio::task::spawn_blocking(move || -> std::result::Result<_, StoreError> {
            let hash = hash_file(&path)?;
            let len = std::fs::metadata(&path)
                .map_err(|e| StoreError::io(&path, e))?
                .len();
            Ok((hash, len))
        })
        .await??
    };

    let mut header = Vec::with_capacity(DIGEST_HEX_LEN + 8);
    header.extend_from_slice(&hash.to_hex_bytes());
    header.extend_from_slice(&len.to_be_bytes());
    timed(config.io_timeout, "block header", async {
        stream.write_all(&header).await?;
        Ok(())
    })
    .await?;

    let file = File::open(&path)
        .await
        .map_err(|e| StoreError::io(&path, e))?;
    let sent = copy_timed(&mut file.take(len), &mut stream, config).await?;
    if sent < len {
        warn!(name = %request.name, index = request.block_idx, sent, len, "source shrank while sending");
    }

    // A failed shutdown only means the peer already went away.
    let _ = stream.shutdown().await;
    debug!(name = %request.name, index = request.block_idx, bytes = sent, "served block");
    Ok(sent)
}

/// Copy until EOF, applying the I/O timeout to every step.
async fn copy_timed<R, W>(reader: &mut R, writer: &mut W, config: &TransferConfig) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; config.chunk_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = timed(config.io_timeout, "read source", async {
            Ok(reader.read(&mut buf).await?)
        })
        .await?;
        if n == 0 {
            return Ok(total);
        }
        timed(config.io_timeout, "write body", async {
            writer.write_all(&buf[..n]).await?;
            Ok(())
        })
        .await?;
        total += n as u64;
    }
}

/// Fetch one block (or the whole file at index 0) from `peer` into `dest`.
///
/// `dest` exists afterwards only if the transfer was complete and its
/// digest matched the header.
pub async fn fetch_block(
    peer: SocketAddr,
    request: &BlockRequest,
    dest: &Path,
    config: &TransferConfig,
) -> Result<FetchedBlock> {
    let result = fetch_block_inner(peer, request, dest, config).await;
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(dest).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %dest.display(), error = %e, "failed to discard partial block");
            }
        }
    }
    result
}

async fn fetch_block_inner(
    peer: SocketAddr,
    request: &BlockRequest,
    dest: &Path,
    config: &TransferConfig,
) -> Result<FetchedBlock> {
    let what = describe(request);
    let mut stream = timed(config.io_timeout, "connect", async {
        Ok(TcpStream::connect(peer).await?)
    })
    .await?;
    timed(config.io_timeout, "send request", write_message(&mut stream, request)).await?;

    let (expected, len) = timed(config.io_timeout, "block header", async {
        let mut digest = [0u8; DIGEST_HEX_LEN];
        stream.read_exact(&mut digest).await.map_err(closed_on_eof)?;
        let expected = ContentHash::from_hex_bytes(&digest)
            .map_err(|e| SyncError::InvalidMessage(e.to_string()))?;
        let len = stream.read_u64().await.map_err(closed_on_eof)?;
        Ok((expected, len))
    })
    .await?;

    let mut file = File::create(dest)
        .await
        .map_err(|e| StoreError::io(dest, e))?;
    let mut hasher = ContentHasher::new();
    let mut buf = vec![0u8; config.chunk_size.max(1)];
    let mut received = 0u64;

    while received < len {
        let want = buf.len().min((len - received) as usize);
        let n = timed(config.io_timeout, "block body", async {
            Ok(stream.read(&mut buf[..want]).await?)
        })
        .await?;
        if n == 0 {
            return Err(SyncError::Truncated {
                what,
                expected: len,
                actual: received,
            });
        }
        hasher.update(&buf[..n]);
        file.write_all(&buf[..n])
            .await
            .map_err(|e| StoreError::io(dest, e))?;
        received += n as u64;
    }
    file.flush().await.map_err(|e| StoreError::io(dest, e))?;

    let actual = hasher.finalize();
    if actual != expected {
        return Err(SyncError::IntegrityFailure {
            what,
            expected,
            actual,
        });
    }
    Ok(FetchedBlock { hash: actual, len })
}

/// [`fetch_block`] under a retry policy.
pub async fn fetch_block_with_retry(
    peer: SocketAddr,
    request: &BlockRequest,
    dest: &Path,
    config: &TransferConfig,
    policy: &RetryPolicy,
) -> Result<FetchedBlock> {
    let what = describe(request);
    policy
        .run(&what, move |_| fetch_block(peer, request, dest, config))
        .await
}

fn describe(request: &BlockRequest) -> String {
    if request.is_whole_file() {
        request.name.clone()
    } else {
        format!("{} block {}", request.name, request.block_idx)
    }
}

fn closed_on_eof(e: std::io::Error) -> SyncError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        SyncError::ConnectionClosed("before block header".into())
    } else {
        SyncError::Io(e)
    }
}

/// Serve block requests for `store` until shutdown.
pub async fn serve_blocks(
    listener: TcpListener,
    store: Arc<FileStore>,
    config: TransferConfig,
    max_connections: usize,
    shutdown: watch::Receiver<bool>,
) {
    let config = Arc::new(config);
    accept_loop(listener, max_connections, shutdown, move |stream, remote| {
        let store = Arc::clone(&store);
        let config = Arc::clone(&config);
        async move {
            if let Err(e) = serve_block(stream, &store, &config).await {
                warn!(%remote, error = %e, "block request failed");
            }
        }
    })
    .await
}
