//! Transport error types.

use thiserror::Error;

use crate::crypto::CipherError;

/// Errors that can occur during transport operations.
///
/// None of these escape the client's bool-returning API as `Err`: connect,
/// send, and receive failures are reported through the registered handlers,
/// and decode failures are recovered into a placeholder message before they
/// ever become an error. The worst case for any failure is a dead connection,
/// signalled by repeated receive-failure callbacks.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The peer host string was neither `localhost` nor a literal IP address.
    #[error("invalid peer address: {0}")]
    InvalidAddress(String),

    /// The TCP connect attempt failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// Operation requires an established connection.
    #[error("not connected")]
    NotConnected,

    /// Writing to the socket failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading from the socket failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    PeerClosed,

    /// Sealing or opening a frame failed.
    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),
}
