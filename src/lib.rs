//! # Chatwire - point-to-point encrypted chat transport
//!
//! Chatwire is the client side of a two-peer chat link: it opens a TCP
//! connection to a server, frames outgoing messages with a small binary
//! protocol, seals every frame with asymmetric encryption, and runs a
//! background task that delivers inbound messages to callbacks while the
//! connection is open.
//!
//! ## Overview
//!
//! - Frames are `[type][length][content]`, encrypted whole per message
//! - Key material is provisioned out of band; each peer holds its own
//!   X25519 secret and the other side's public key
//! - Connect, send, and receive failures are reported through optional
//!   handlers, never as errors from the public API
//! - A corrupted or truncated inbound frame degrades to a placeholder text
//!   message instead of failing the consumer
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use chatwire::{ChatClient, ClientConfig, EventHandlers, KeyPair, SealedCipher};
//!
//! # async fn run() {
//! let ours = KeyPair::generate();
//! let peer = KeyPair::generate(); // their public key arrives out of band
//!
//! let cipher = SealedCipher::new(ours.into_secret_key(), *peer.public_key());
//! let handlers = EventHandlers::new()
//!     .on_message_received(|message| println!("peer: {}", message.as_text()));
//!
//! let client = ChatClient::new(ClientConfig::default(), Arc::new(cipher), handlers);
//!
//! if client.connect("localhost", 5000).await {
//!     client.start_listening();
//!     client.send_text("hello").await;
//! }
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`client`]: the transport façade and receive loop
//! - [`codec`]: binary message framing
//! - [`connection`]: TCP connection lifecycle
//! - [`crypto`]: key management and frame sealing
//! - [`events`]: optional callback configuration
//! - [`config`]: transport parameters

pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod crypto;
pub mod error;
pub mod events;

// Re-export the commonly used types at the crate root
pub use client::ChatClient;
pub use codec::{decode, encode, Message, ResponseType, FRAME_HEADER_LEN};
pub use config::{ClientConfig, DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_READ_RETRY_DELAY_MS};
pub use connection::{resolve_peer_addr, Connection};
pub use crypto::{Cipher, CipherError, KeyError, KeyPair, SealedCipher, SEAL_OVERHEAD};
pub use error::TransportError;
pub use events::EventHandlers;
