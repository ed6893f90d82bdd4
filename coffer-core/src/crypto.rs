//! Crypto service contract and the AES-256-GCM implementation.
//!
//! The cache store treats encryption as a black box: it only decides *when*
//! to call [`CryptoService::encrypt`] and [`CryptoService::decrypt`]. Any
//! authenticated-encryption primitive can be plugged in behind the trait.

use std::fmt;

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// Size in bytes of an AES-256 key.
pub const AES_256_KEY_SIZE: usize = 32;

/// Size in bytes of the GCM nonce prefixed to every ciphertext.
pub const NONCE_SIZE: usize = 12;

/// Size in bytes of the GCM authentication tag.
pub const TAG_SIZE: usize = 16;

/// Encryption capability shared with a cache store.
///
/// Implementations own the key material; the store never sees raw keys.
/// A service is shared (`Arc`) and the store does not manage its lifecycle.
pub trait CryptoService: Send + Sync {
    /// Encrypt `plaintext`, returning an opaque ciphertext blob.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Decrypt a blob previously produced by [`encrypt`](Self::encrypt).
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Whether the service can be used. Unavailable services are rejected
    /// when attached to a store.
    fn is_available(&self) -> bool {
        true
    }
}

/// AES-256-GCM crypto service.
///
/// # Ciphertext Format
///
/// `[nonce: 12 bytes][ciphertext][tag: 16 bytes]`
///
/// A fresh random nonce is drawn for every call to `encrypt`, so encrypting
/// the same plaintext twice yields different blobs.
pub struct AesGcmCryptoService {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl AesGcmCryptoService {
    /// Create a service from a raw 32-byte key.
    ///
    /// # Errors
    /// Returns `CryptoError::InvalidKey` if the key is not exactly 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != AES_256_KEY_SIZE {
            return Err(CryptoError::InvalidKey {
                reason: format!(
                    "expected {} bytes, got {}",
                    AES_256_KEY_SIZE,
                    key.len()
                ),
            });
        }
        let unbound = UnboundKey::new(&AES_256_GCM, key).map_err(|e| CryptoError::InvalidKey {
            reason: e.to_string(),
        })?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Derive the key from a passphrase with SHA-256.
    pub fn from_passphrase(passphrase: &SecretString) -> Result<Self, CryptoError> {
        let phrase = passphrase.expose_secret();
        if phrase.is_empty() {
            return Err(CryptoError::InvalidKey {
                reason: "passphrase is empty".to_string(),
            });
        }
        let digest = Sha256::digest(phrase.as_bytes());
        Self::new(digest.as_slice())
    }
}

impl CryptoService for AesGcmCryptoService {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce = [0u8; NONCE_SIZE];
        self.rng
            .fill(&mut nonce)
            .map_err(|e| CryptoError::EncryptionFailed {
                reason: format!("nonce generation: {}", e),
            })?;

        let mut out = Vec::with_capacity(NONCE_SIZE + plaintext.len() + TAG_SIZE);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(plaintext);

        let tag = self
            .key
            .seal_in_place_separate_tag(
                Nonce::assume_unique_for_key(nonce),
                Aad::empty(),
                &mut out[NONCE_SIZE..],
            )
            .map_err(|e| CryptoError::EncryptionFailed {
                reason: e.to_string(),
            })?;
        out.extend_from_slice(tag.as_ref());
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::DecryptionFailed {
                reason: format!(
                    "ciphertext too short: {} bytes, need at least {}",
                    ciphertext.len(),
                    NONCE_SIZE + TAG_SIZE
                ),
            });
        }
        let (nonce, body) = ciphertext.split_at(NONCE_SIZE);
        let nonce = Nonce::try_assume_unique_for_key(nonce).map_err(|e| {
            CryptoError::DecryptionFailed {
                reason: e.to_string(),
            }
        })?;

        let mut buf = body.to_vec();
        let plaintext_len = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut buf)
            .map_err(|e| CryptoError::DecryptionFailed {
                reason: e.to_string(),
            })?
            .len();
        buf.truncate(plaintext_len);
        Ok(buf)
    }
}

impl fmt::Debug for AesGcmCryptoService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AesGcmCryptoService([REDACTED])")
    }
}
