//! Line-based connection wrapper
//!
//! Splits a byte stream into a buffered line reader, owned by the session,
//! and a writer task draining a bounded outbound channel. The channel's
//! `Sender` is the session's sink: both the session and the registry push
//! lines through it, so a peer sees them in the order they were queued.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{AppError, SendError};

/// One accepted peer stream
pub struct Connection<R> {
    reader: BufReader<R>,
    outbound: mpsc::Sender<String>,
    writer: JoinHandle<()>,
    peer_addr: Option<SocketAddr>,
    local_addr: Option<SocketAddr>,
}

impl Connection<OwnedReadHalf> {
    /// Wrap an accepted TCP stream
    pub fn from_tcp(stream: TcpStream, capacity: usize) -> Self {
        let peer_addr = stream.peer_addr().ok();
        let local_addr = stream.local_addr().ok();
        let (read_half, write_half) = stream.into_split();
        Self::new(read_half, write_half, capacity).with_addrs(peer_addr, local_addr)
    }
}

impl<R> Connection<R>
where
    R: AsyncRead + Unpin,
{
    /// Build a connection from separate read and write halves
    ///
    /// Spawns the writer task immediately.
    pub fn new<W>(reader: R, writer: W, capacity: usize) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound, rx) = mpsc::channel(capacity);
        let writer = tokio::spawn(write_lines(writer, rx));

        Self {
            reader: BufReader::new(reader),
            outbound,
            writer,
            peer_addr: None,
            local_addr: None,
        }
    }

    /// Attach the socket addresses
    pub fn with_addrs(mut self, peer_addr: Option<SocketAddr>, local_addr: Option<SocketAddr>) -> Self {
        self.peer_addr = peer_addr;
        self.local_addr = local_addr;
        self
    }

    /// Remote address, if known
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Local address the peer connected to, if known
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Read one line without its terminator
    ///
    /// Returns `Ok(None)` on EOF. A trailing `\r` is stripped as well.
    pub async fn read_line(&mut self) -> Result<Option<String>, AppError> {
        let mut line = String::new();
        let bytes = self.reader.read_line(&mut line).await?;
        if bytes == 0 {
            return Ok(None);
        }

        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }

    /// Clone of the outbound sink, for registration
    pub fn sink(&self) -> mpsc::Sender<String> {
        self.outbound.clone()
    }

    /// Queue one line for the peer
    pub async fn send_line(&self, line: impl Into<String>) -> Result<(), SendError> {
        self.outbound
            .send(line.into())
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Queue several lines for the peer, in order
    pub async fn send_lines(&self, lines: Vec<String>) -> Result<(), SendError> {
        for line in lines {
            self.send_line(line).await?;
        }
        Ok(())
    }

    /// Close the connection
    ///
    /// Drops the local sink and waits up to `timeout` for the writer to
    /// drain. The writer only finishes once every other sink clone (the
    /// registry's) is gone too, so unregister first.
    pub async fn close(self, timeout: Duration) {
        let Connection {
            outbound,
            mut writer,
            peer_addr,
            ..
        } = self;
        drop(outbound);

        match tokio::time::timeout(timeout, &mut writer).await {
            Ok(Ok(())) => debug!("Connection to {:?} closed", peer_addr),
            Ok(Err(e)) => warn!("Writer task for {:?} failed: {}", peer_addr, e),
            Err(_) => {
                warn!("Writer task for {:?} did not drain in time, aborting", peer_addr);
                writer.abort();
            }
        }
    }
}

/// Writer task: drain the outbound channel onto the stream
///
/// Ends when every sender is dropped or a write fails. Dropping the
/// receiver on failure makes every sink observe a closed channel.
async fn write_lines<W>(mut writer: W, mut rx: mpsc::Receiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        let mut bytes = line.into_bytes();
        bytes.push(b'\n');

        if let Err(e) = writer.write_all(&bytes).await {
            debug!("Write failed, ending writer task: {}", e);
            return;
        }
        if let Err(e) = writer.flush().await {
            debug!("Flush failed, ending writer task: {}", e);
            return;
        }
    }

    let _ = writer.shutdown().await;
    debug!("Writer task ended");
}
