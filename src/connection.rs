//! TCP connection lifecycle management.
//!
//! A [`Connection`] owns at most one live socket at a time, split into its
//! read and write halves. The write half stays here for the whole life of
//! the socket, behind an async mutex that also serializes concurrent sends.
//! The read half is loaned out to the receive loop while it runs and handed
//! back when the loop stops, so a stop/start cycle resumes delivery on the
//! same socket.
//!
//! State transitions are published on a watch channel. The receive loop
//! selects on it so an explicit disconnect interrupts a parked read
//! immediately instead of waiting for the peer to close.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use crate::error::TransportError;

/// Resolve a peer host string to a socket address.
///
/// `"localhost"` (case-insensitive) maps to the IPv4 loopback address; any
/// other host must be a literal IP address. No DNS lookup is performed.
pub fn resolve_peer_addr(host: &str, port: u16) -> Result<SocketAddr, TransportError> {
    if host.eq_ignore_ascii_case("localhost") {
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port));
    }

    host.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, port))
        .map_err(|_| TransportError::InvalidAddress(host.to_string()))
}

/// Owner of the TCP socket halves.
pub struct Connection {
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    state: watch::Sender<bool>,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection {
    /// Create an unconnected instance.
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            state,
        }
    }

    /// Establish the TCP connection.
    ///
    /// The caller is responsible for checking [`is_connected`](Self::is_connected)
    /// first; connecting over a live socket would drop it, so the client
    /// treats that case as a no-op before ever calling this.
    pub async fn connect(&self, addr: SocketAddr) -> Result<(), TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::ConnectFailed)?;

        let (read_half, write_half) = stream.into_split();
        *self.reader.lock().await = Some(read_half);
        *self.writer.lock().await = Some(write_half);
        self.state.send_replace(true);

        info!(peer = %addr, "connected");
        Ok(())
    }

    /// Close the connection: shut down the write side, then drop both
    /// halves. Idempotent: disconnecting while disconnected is a no-op.
    pub async fn disconnect(&self) {
        if let Some(mut write_half) = self.writer.lock().await.take() {
            let _ = write_half.shutdown().await;
            debug!("write half shut down");
        }
        self.reader.lock().await.take();

        if self.state.send_replace(false) {
            info!("disconnected");
        }
    }

    /// Whether the socket is currently alive, derived from the held socket
    /// handle rather than a cached flag.
    pub async fn is_connected(&self) -> bool {
        if let Some(write_half) = self.writer.lock().await.as_ref() {
            return write_half.peer_addr().is_ok();
        }
        false
    }

    /// The peer address of the live socket, if connected.
    pub async fn peer_addr(&self) -> Option<SocketAddr> {
        self.writer
            .lock()
            .await
            .as_ref()
            .and_then(|write_half| write_half.peer_addr().ok())
    }

    /// Encrypted frame write. Holding the writer lock across the write is
    /// what serializes concurrent senders.
    pub async fn write_frame(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut guard = self.writer.lock().await;
        let write_half = guard.as_mut().ok_or(TransportError::NotConnected)?;

        write_half
            .write_all(bytes)
            .await
            .map_err(TransportError::SendFailed)?;
        write_half.flush().await.map_err(TransportError::SendFailed)
    }

    /// Loan the read half to the receive loop. Returns `None` when
    /// disconnected or while another loop instance still holds it.
    pub(crate) async fn take_reader(&self) -> Option<OwnedReadHalf> {
        self.reader.lock().await.take()
    }

    /// Hand the read half back after the receive loop stops. Dropped
    /// instead if the connection went down in the meantime.
    pub(crate) async fn restore_reader(&self, read_half: OwnedReadHalf) {
        if *self.state.borrow() {
            *self.reader.lock().await = Some(read_half);
        }
    }

    /// Subscribe to connection-state transitions (`true` = connected).
    pub(crate) fn state_receiver(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}
