//! The transport façade and its background receive loop.
//!
//! [`ChatClient`] composes the codec, cipher, and connection manager into the
//! client-facing API: connect/disconnect, text and raw sends, and a
//! start/stop-controlled background task that reads, decrypts, decodes, and
//! dispatches inbound frames to the registered handlers.
//!
//! Failures never escape the public API as errors: the bool return values
//! only reflect preconditions, and everything else arrives through
//! [`EventHandlers`]. See the individual methods for the exact contracts.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn};

use crate::codec::{self, Message};
use crate::config::ClientConfig;
use crate::connection::{resolve_peer_addr, Connection};
use crate::crypto::Cipher;
use crate::error::TransportError;
use crate::events::EventHandlers;

/// Client side of a point-to-point chat connection.
///
/// One instance owns one socket and at most one receive task. Sends happen
/// on the caller's task; inbound messages are delivered from the receive
/// task via the handlers the client was built with.
pub struct ChatClient {
    config: ClientConfig,
    cipher: Arc<dyn Cipher>,
    handlers: EventHandlers,
    conn: Arc<Connection>,
    listening: watch::Sender<bool>,
    listen_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("config", &self.config)
            .field("handlers", &self.handlers)
            .field("listening", &*self.listening.borrow())
            .finish()
    }
}

impl ChatClient {
    /// Create an unconnected client.
    pub fn new(config: ClientConfig, cipher: Arc<dyn Cipher>, handlers: EventHandlers) -> Self {
        let (listening, _) = watch::channel(false);
        Self {
            config,
            cipher,
            handlers,
            conn: Arc::new(Connection::new()),
            listening,
            listen_task: std::sync::Mutex::new(None),
        }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connect to a peer by host string.
    ///
    /// `"localhost"` resolves to the loopback address; any other host must be
    /// a literal IP. An unparseable host returns `false` without attempting a
    /// connect and without firing a handler.
    pub async fn connect(&self, host: &str, port: u16) -> bool {
        match resolve_peer_addr(host, port) {
            Ok(addr) => self.connect_addr(addr).await,
            Err(_) => false,
        }
    }

    /// Connect to a peer address.
    ///
    /// Returns `false` without side effects when already connected (at most
    /// one active socket). A failed connect fires the connect-failure handler
    /// and returns `false`; it never returns an error.
    pub async fn connect_addr(&self, addr: SocketAddr) -> bool {
        if self.conn.is_connected().await {
            return false;
        }

        match self.conn.connect(addr).await {
            Ok(()) => true,
            Err(error) => {
                self.handlers.connect_failure(error);
                false
            }
        }
    }

    /// Close the connection. Idempotent. The receive loop, if running, keeps
    /// iterating and reports the missing socket through the receive-failure
    /// handler until stopped or reconnected.
    pub async fn disconnect(&self) {
        self.conn.disconnect().await;
    }

    /// Whether the socket is currently alive (derived from the socket
    /// handle, not cached).
    pub async fn is_connected(&self) -> bool {
        self.conn.is_connected().await
    }

    /// Send a text message.
    ///
    /// Returns `false` when the framed message would exceed
    /// `max_response_bytes`. Nothing is written and no handler fires.
    /// Otherwise behaves like [`send_raw`](Self::send_raw).
    pub async fn send_text(&self, text: &str) -> bool {
        let frame = codec::encode(&Message::text(text), self.config.max_response_bytes);
        if frame.is_empty() {
            debug!(len = text.len(), "text message too large to frame");
            return false;
        }
        self.send_raw(&frame).await
    }

    /// Encrypt and send a raw payload.
    ///
    /// - An empty buffer returns `false` without firing a handler.
    /// - A buffer longer than `max_response_bytes` is silently truncated to
    ///   that length before encryption (documented data loss, not an error).
    /// - When not connected, the send-failure handler fires with
    ///   [`TransportError::NotConnected`] and the call returns `false`.
    /// - Once connected, the call returns `true` even if sealing or the
    ///   socket write fails; those failures are reported only through the
    ///   send-failure handler. Callers that need failure visibility must
    ///   install the handler; the return value will not show it.
    pub async fn send_raw(&self, buffer: &[u8]) -> bool {
        if buffer.is_empty() {
            return false;
        }

        let payload = if buffer.len() > self.config.max_response_bytes {
            warn!(
                len = buffer.len(),
                max = self.config.max_response_bytes,
                "truncating oversized outgoing payload"
            );
            &buffer[..self.config.max_response_bytes]
        } else {
            buffer
        };

        if !self.conn.is_connected().await {
            self.handlers.send_failure(TransportError::NotConnected);
            return false;
        }

        match self.cipher.encrypt(payload) {
            Ok(sealed) => {
                if let Err(error) = self.conn.write_frame(&sealed).await {
                    self.handlers.send_failure(error);
                }
            }
            Err(error) => self.handlers.send_failure(error.into()),
        }
        true
    }

    /// Start the background receive task. No-op when already listening.
    ///
    /// Must be called from within a tokio runtime. If a previous task is
    /// still winding down after [`stop_listening`](Self::stop_listening),
    /// the new task waits for it to exit before reading, so there is never
    /// more than one reader on the socket.
    pub fn start_listening(&self) {
        let mut guard = self.listen_task.lock().expect("listener state poisoned");

        let running = guard.as_ref().is_some_and(|handle| !handle.is_finished());
        if running && *self.listening.borrow() {
            return;
        }

        self.listening.send_replace(true);
        let worker = ReceiveLoop {
            conn: Arc::clone(&self.conn),
            cipher: Arc::clone(&self.cipher),
            handlers: self.handlers.clone(),
            max_response_bytes: self.config.max_response_bytes,
            retry_delay: self.config.read_retry_delay(),
            listening: self.listening.subscribe(),
            conn_state: self.conn.state_receiver(),
        };

        let previous = guard.take();
        *guard = Some(tokio::spawn(async move {
            if let Some(handle) = previous {
                let _ = handle.await;
            }
            worker.run().await;
        }));
    }

    /// Signal the receive task to stop and return immediately.
    ///
    /// The task exits at its next cancellation point; callers must not
    /// assume it has stopped the instant this returns. Use
    /// [`stop_listening_and_wait`](Self::stop_listening_and_wait) for that
    /// guarantee.
    pub fn stop_listening(&self) {
        self.listening.send_replace(false);
    }

    /// Signal the receive task to stop and wait until it has fully exited.
    pub async fn stop_listening_and_wait(&self) {
        self.listening.send_replace(false);

        let handle = self
            .listen_task
            .lock()
            .expect("listener state poisoned")
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Whether the receive task is currently running.
    pub fn is_listening(&self) -> bool {
        *self.listening.borrow()
            && self
                .listen_task
                .lock()
                .expect("listener state poisoned")
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }
}

/// Outcome of one receive-loop iteration.
enum Step {
    /// Nothing to do; keep the read half and go around.
    Keep,
    /// Stop was signalled.
    Stop,
    /// A frame of this many bytes was read.
    Frame(usize),
    /// The connection was explicitly disconnected; release the read half.
    Detached,
    /// The socket died underneath us.
    Lost(TransportError),
}

/// Background task state. One instance per `start_listening` cycle.
struct ReceiveLoop {
    conn: Arc<Connection>,
    cipher: Arc<dyn Cipher>,
    handlers: EventHandlers,
    max_response_bytes: usize,
    retry_delay: Duration,
    listening: watch::Receiver<bool>,
    conn_state: watch::Receiver<bool>,
}

impl ReceiveLoop {
    /// Read frames until stopped.
    ///
    /// The loop never stops itself: a dead socket is reported through the
    /// receive-failure handler on every paced attempt, and only the stop
    /// signal (or the client being dropped) ends the task. Frames are
    /// delivered in arrival order, one handler call per decoded frame,
    /// synchronously on this task.
    async fn run(mut self) {
        debug!("receive loop started");
        let mut buf = vec![0u8; self.max_response_bytes];
        let mut reader: Option<OwnedReadHalf> = None;

        while *self.listening.borrow() {
            let held = match reader.take() {
                Some(read_half) => Some(read_half),
                None => self.conn.take_reader().await,
            };
            let Some(mut read_half) = held else {
                self.handlers.receive_failure(TransportError::NotConnected);
                if !self.pause().await {
                    break;
                }
                continue;
            };

            let step = tokio::select! {
                changed = self.listening.changed() => {
                    if changed.is_err() || !*self.listening.borrow() {
                        Step::Stop
                    } else {
                        Step::Keep
                    }
                }
                _ = self.conn_state.wait_for(|connected| !connected) => Step::Detached,
                read = read_half.read(&mut buf) => match read {
                    Ok(0) => Step::Lost(TransportError::PeerClosed),
                    Ok(n) => Step::Frame(n),
                    Err(error) => Step::Lost(TransportError::ReceiveFailed(error)),
                },
            };

            match step {
                Step::Keep => reader = Some(read_half),
                Step::Stop => {
                    reader = Some(read_half);
                    break;
                }
                Step::Frame(n) => {
                    self.deliver(&buf[..n]);
                    reader = Some(read_half);
                }
                Step::Detached => {
                    // Explicit disconnect: dropping the read half closes the
                    // socket fully. The NotConnected path above takes over.
                    drop(read_half);
                }
                Step::Lost(error) => {
                    drop(read_half);
                    self.handlers.receive_failure(error);
                    self.conn.disconnect().await;
                    if !self.pause().await {
                        break;
                    }
                }
            }
        }

        if let Some(read_half) = reader {
            self.conn.restore_reader(read_half).await;
        }
        debug!("receive loop stopped");
    }

    /// Decrypt and decode one inbound frame, then dispatch it.
    fn deliver(&self, sealed: &[u8]) {
        match self.cipher.decrypt(sealed) {
            Ok(plaintext) => self.handlers.message_received(codec::decode(&plaintext)),
            Err(error) => {
                warn!(error = %error, "could not open inbound frame");
                self.handlers.receive_failure(TransportError::Cipher(error));
            }
        }
    }

    /// Pace the next attempt. Returns `false` when stop was signalled (or
    /// the client was dropped) during the pause.
    async fn pause(&mut self) -> bool {
        tokio::select! {
            _ = time::sleep(self.retry_delay) => true,
            changed = self.listening.changed() => {
                changed.is_ok() && *self.listening.borrow()
            }
        }
    }
}
