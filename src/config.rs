//! Transport configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default cap on outgoing payloads and the receive buffer, in bytes.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024;

/// Default pacing delay between failed read attempts, in milliseconds.
pub const DEFAULT_READ_RETRY_DELAY_MS: u64 = 100;

/// Configuration for a [`ChatClient`](crate::client::ChatClient).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Caps both the outgoing plaintext payload (oversized sends are
    /// truncated to this length) and the size of the receive buffer.
    ///
    /// The receive buffer must also hold the sealed envelope, which is
    /// [`SEAL_OVERHEAD`](crate::crypto::SEAL_OVERHEAD) bytes larger than its
    /// plaintext, so size this with that headroom in mind when peers send
    /// near-maximum payloads.
    pub max_response_bytes: usize,

    /// Delay between receive attempts after a failed or degenerate read.
    /// Bounds CPU usage and callback rate while the connection is down.
    pub read_retry_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            read_retry_delay_ms: DEFAULT_READ_RETRY_DELAY_MS,
        }
    }
}

impl ClientConfig {
    /// Create a config with custom values.
    pub fn new(max_response_bytes: usize, read_retry_delay_ms: u64) -> Self {
        Self {
            max_response_bytes,
            read_retry_delay_ms,
        }
    }

    /// The retry delay as a [`Duration`].
    pub fn read_retry_delay(&self) -> Duration {
        Duration::from_millis(self.read_retry_delay_ms)
    }
}
