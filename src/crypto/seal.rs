//! Whole-frame encryption using X25519 key exchange and ChaCha20Poly1305.
//!
//! Every outgoing frame is sealed for the peer's public key:
//! 1. Generate an ephemeral X25519 key pair
//! 2. Perform ECDH with the peer's public key
//! 3. Derive a symmetric key with HKDF-SHA256
//! 4. Encrypt the frame with ChaCha20Poly1305
//!
//! Inbound envelopes are opened with our static secret key. The [`Cipher`]
//! trait keeps the capability pluggable: anything that can turn a bounded
//! plaintext block into bytes and back will do.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::Sha256;
use thiserror::Error;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::Zeroize;

/// HKDF info string for key derivation.
const HKDF_INFO: &[u8] = b"CHATWIRE-V1-SEAL";

/// Nonce size for ChaCha20Poly1305.
const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag size.
const TAG_SIZE: usize = 16;

/// Bytes a sealed envelope adds on top of the plaintext:
/// ephemeral public key (32) + nonce (12) + auth tag (16).
pub const SEAL_OVERHEAD: usize = 32 + NONCE_SIZE + TAG_SIZE;

/// Default per-call plaintext ceiling for [`SealedCipher`].
pub const DEFAULT_MAX_BLOCK_LEN: usize = 8192;

/// Errors that can occur while sealing or opening a frame.
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("encryption failed: {0}")]
    EncryptFailed(String),

    #[error("decryption failed: {0}")]
    DecryptFailed(String),

    #[error("invalid envelope: too short")]
    CiphertextTooShort,

    #[error("plaintext block too large: {len} bytes (max {max})")]
    BlockTooLarge { len: usize, max: usize },

    #[error("key derivation failed")]
    KeyDerivationFailed,
}

/// Whole-buffer encrypt/decrypt capability applied to frames.
///
/// Implementations operate on single blocks bounded by
/// [`max_block_len`](Cipher::max_block_len); the transport is responsible for
/// keeping outgoing buffers under that ceiling. No chunking across blocks.
pub trait Cipher: Send + Sync {
    /// Seal a plaintext block for the peer.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Open a sealed envelope received from the peer.
    fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Hard per-call plaintext size ceiling.
    fn max_block_len(&self) -> usize;
}

/// The default [`Cipher`]: X25519 ECDH + HKDF-SHA256 + ChaCha20Poly1305.
///
/// Owns our static secret and the peer's public key for the lifetime of the
/// transport. Envelope format: `ephemeral_public (32) || nonce (12) ||
/// ciphertext+tag (len + 16)`.
pub struct SealedCipher {
    local_secret: StaticSecret,
    peer_public: PublicKey,
    max_block_len: usize,
}

impl std::fmt::Debug for SealedCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Don't expose the secret key in debug output
        f.debug_struct("SealedCipher")
            .field("peer_public", &hex::encode(self.peer_public.as_bytes()))
            .field("max_block_len", &self.max_block_len)
            .field("local_secret", &"[REDACTED]")
            .finish()
    }
}

impl SealedCipher {
    /// Create a cipher from our secret key and the peer's public key.
    pub fn new(local_secret: StaticSecret, peer_public: PublicKey) -> Self {
        Self {
            local_secret,
            peer_public,
            max_block_len: DEFAULT_MAX_BLOCK_LEN,
        }
    }

    /// Override the per-call plaintext ceiling.
    pub fn with_max_block_len(mut self, max_block_len: usize) -> Self {
        self.max_block_len = max_block_len;
        self
    }
}

impl Cipher for SealedCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        if plaintext.len() > self.max_block_len {
            return Err(CipherError::BlockTooLarge {
                len: plaintext.len(),
                max: self.max_block_len,
            });
        }

        // Ephemeral key pair + ECDH with the peer's public key
        let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
        let ephemeral_public = PublicKey::from(&ephemeral_secret);
        let shared_secret = ephemeral_secret.diffie_hellman(&self.peer_public);

        let mut symmetric_key = derive_symmetric_key(shared_secret.as_bytes())?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::RngCore::fill_bytes(&mut OsRng, &mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let cipher = ChaCha20Poly1305::new_from_slice(&symmetric_key)
            .map_err(|e| CipherError::EncryptFailed(e.to_string()))?;
        symmetric_key.zeroize();

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CipherError::EncryptFailed(e.to_string()))?;

        let mut sealed = Vec::with_capacity(SEAL_OVERHEAD + plaintext.len());
        sealed.extend_from_slice(ephemeral_public.as_bytes());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, CipherError> {
        // Minimum: ephemeral public (32) + nonce (12) + auth tag (16)
        if sealed.len() < SEAL_OVERHEAD {
            return Err(CipherError::CiphertextTooShort);
        }

        let mut ephemeral_bytes = [0u8; 32];
        ephemeral_bytes.copy_from_slice(&sealed[..32]);
        let ephemeral_public = PublicKey::from(ephemeral_bytes);

        let nonce = Nonce::from_slice(&sealed[32..32 + NONCE_SIZE]);
        let ciphertext = &sealed[32 + NONCE_SIZE..];

        let shared_secret = self.local_secret.diffie_hellman(&ephemeral_public);
        let mut symmetric_key = derive_symmetric_key(shared_secret.as_bytes())?;

        let cipher = ChaCha20Poly1305::new_from_slice(&symmetric_key)
            .map_err(|e| CipherError::DecryptFailed(e.to_string()))?;
        symmetric_key.zeroize();

        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| CipherError::DecryptFailed(e.to_string()))
    }

    fn max_block_len(&self) -> usize {
        self.max_block_len
    }
}

/// Derive the per-envelope symmetric key from an ECDH shared secret.
fn derive_symmetric_key(shared_secret: &[u8]) -> Result<[u8; 32], CipherError> {
    let hk = Hkdf::<Sha256>::new(None, shared_secret);
    let mut symmetric_key = [0u8; 32];
    hk.expand(HKDF_INFO, &mut symmetric_key)
        .map_err(|_| CipherError::KeyDerivationFailed)?;
    Ok(symmetric_key)
}
