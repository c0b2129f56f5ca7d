//! Cryptographic operations for the transport.
//!
//! This module provides:
//! - Key generation and PEM serialization (X25519)
//! - Whole-frame sealing (X25519 ECDH + HKDF-SHA256 + ChaCha20Poly1305)
//!
//! The [`Cipher`] trait is the seam the transport depends on; [`SealedCipher`]
//! is the default implementation.

pub mod keys;
pub mod seal;

pub use keys::{
    decode_public_key_pem, decode_secret_key_pem, encode_public_key_pem, encode_secret_key_pem,
    load_public_key, load_secret_key, KeyError, KeyPair,
};
pub use seal::{Cipher, CipherError, SealedCipher, DEFAULT_MAX_BLOCK_LEN, SEAL_OVERHEAD};
