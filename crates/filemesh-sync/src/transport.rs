//! Framing and the tracker client.
//!
//! Every JSON message travels as a 4-byte big-endian length followed by the
//! payload. Each side reads exactly the announced number of bytes, so a
//! message split across TCP segments is reassembled and an oversized header
//! is rejected before anything is allocated.

use std::future::Future;
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::messages::{self, limits, Directory, HeartbeatRequest};

/// Default deadline for one heartbeat exchange with the tracker.
pub const DEFAULT_TRACKER_TIMEOUT: Duration = Duration::from_secs(180);

/// Write one length-prefixed frame.
pub async fn write_frame<W>(io: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len()).map_err(|_| SyncError::FrameTooLarge {
        len: payload.len() as u64,
        max: u32::MAX as u64,
    })?;
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32(len);
    buf.extend_from_slice(payload);
    io.write_all(&buf).await?;
    io.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame of at most `max_len` bytes.
pub async fn read_frame<R>(io: &mut R, max_len: u32) -> Result<BytesMut>
where
    R: AsyncRead + Unpin,
{
    let len = io.read_u32().await.map_err(eof_as_closed("frame header"))?;
    if len > max_len {
        return Err(SyncError::FrameTooLarge {
            len: len as u64,
            max: max_len as u64,
        });
    }
    let mut buf = BytesMut::zeroed(len as usize);
    io.read_exact(&mut buf)
        .await
        .map_err(eof_as_closed("frame body"))?;
    Ok(buf)
}

/// Encode `message` as JSON and write it as one frame.
pub async fn write_message<W, T>(io: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = messages::encode(message)?;
    write_frame(io, &payload).await
}

/// Read one frame and decode it as JSON.
pub async fn read_message<R, T>(io: &mut R, max_len: u32) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let frame = read_frame(io, max_len).await?;
    messages::decode(&frame)
}

/// Run `fut` with a deadline, mapping expiry to [`SyncError::Timeout`].
pub async fn timed<F, T>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::Timeout(format!("{what} after {limit:?}"))),
    }
}

fn eof_as_closed(what: &'static str) -> impl Fn(std::io::Error) -> SyncError {
    move |e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            SyncError::ConnectionClosed(what.to_string())
        } else {
            SyncError::Io(e)
        }
    }
}

/// What a heartbeat returns.
#[derive(Debug, Clone, Default)]
pub struct HeartbeatReply {
    /// Full directory snapshot.
    pub directory: Directory,
    /// Local address the tracker saw this peer connect from, when known.
    ///
    /// Used to recognize the peer's own records in the directory.
    pub observed_ip: Option<IpAddr>,
}

/// Client side of the tracker protocol.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait TrackerClient: Send + Sync {
    /// Send the inventory and receive the directory.
    async fn heartbeat(&self, request: &HeartbeatRequest) -> Result<HeartbeatReply>;
}

#[async_trait]
impl<T: TrackerClient + ?Sized> TrackerClient for std::sync::Arc<T> {
    async fn heartbeat(&self, request: &HeartbeatRequest) -> Result<HeartbeatReply> {
        (**self).heartbeat(request).await
    }
}

/// Tracker client over TCP, one connection per heartbeat.
#[derive(Debug, Clone)]
pub struct TcpTrackerClient {
    addr: SocketAddr,
    timeout: Duration,
}

impl TcpTrackerClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            timeout: DEFAULT_TRACKER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

#[async_trait]
impl TrackerClient for TcpTrackerClient {
    async fn heartbeat(&self, request: &HeartbeatRequest) -> Result<HeartbeatReply> {
        timed(self.timeout, "tracker heartbeat", async {
            let mut stream = TcpStream::connect(self.addr).await?;
            let observed_ip = stream.local_addr().ok().map(|a| a.ip());

            write_message(&mut stream, request).await?;
            let directory: Directory = read_message(&mut stream, limits::MAX_FRAME_LEN).await?;
            debug!(tracker = %self.addr, records = directory.len(), "heartbeat answered");

            Ok(HeartbeatReply {
                directory,
                observed_ip,
            })
        })
        .await
    }
}
