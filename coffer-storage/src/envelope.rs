//! Crypto envelope: encrypt-on-write, decrypt-on-read.
//!
//! With a crypto service, values go `CacheValue -> JSON -> encrypt` on the
//! way in and `decrypt -> JSON -> CacheValue` on the way out. Without one,
//! the JSON bytes are stored as is.

use std::sync::Arc;

use coffer_core::{CacheValue, CryptoService, EnvelopeError, StoreOptions};

/// Value codec chosen from the store options when the store is built.
#[derive(Clone)]
pub enum Envelope {
    Plain,
    Sealed(Arc<dyn CryptoService>),
}

impl Envelope {
    pub fn from_options(options: &StoreOptions) -> Self {
        match options.crypto_service() {
            Some(service) => Self::Sealed(Arc::clone(service)),
            None => Self::Plain,
        }
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self, Self::Sealed(_))
    }

    /// Encode a value for the backend.
    pub fn seal(&self, value: &CacheValue) -> Result<Vec<u8>, EnvelopeError> {
        let bytes = value.to_json_bytes().map_err(EnvelopeError::Marshal)?;
        match self {
            Self::Plain => Ok(bytes),
            Self::Sealed(service) => {
                if bytes.is_empty() {
                    return Err(EnvelopeError::EmptyValue);
                }
                service.encrypt(&bytes).map_err(EnvelopeError::Encrypt)
            }
        }
    }

    /// Decode bytes read from the backend.
    ///
    /// In plain mode, bytes that are not JSON are returned as a string so
    /// keys written by other clients stay readable.
    pub fn open(&self, raw: &[u8]) -> Result<CacheValue, EnvelopeError> {
        match self {
            Self::Plain => Ok(CacheValue::from_json_bytes(raw)
                .unwrap_or_else(|_| CacheValue::String(String::from_utf8_lossy(raw).into_owned()))),
            Self::Sealed(service) => {
                if raw.is_empty() {
                    return Err(EnvelopeError::EmptyCiphertext);
                }
                let plaintext = service.decrypt(raw).map_err(EnvelopeError::Decrypt)?;
                CacheValue::from_json_bytes(&plaintext).map_err(EnvelopeError::Unmarshal)
            }
        }
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "Envelope::Plain"),
            Self::Sealed(_) => write!(f, "Envelope::Sealed(..)"),
        }
    }
}
