//! Backend adapter contract.
//!
//! A backend adapter translates the store's abstract operations into calls
//! against a concrete key-value service. Adapters see only opaque bytes; the
//! envelope and the tenant filter live above this layer.
//!
//! Two adapters ship with the crate:
//! - [`MemoryConnector`]: in-process keyspaces with lazy TTL expiry
//! - [`RedisConnector`]: a Redis server over a multiplexed connection
//!   (`redis` feature)

use std::time::Duration;

use async_trait::async_trait;
use coffer_core::{BackendError, ConnectionConfig};

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use memory::{MemoryBackend, MemoryConnector};
#[cfg(feature = "redis")]
pub use self::redis::{RedisBackend, RedisConnector};

/// Which keys to enumerate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
    /// Every key in the namespace.
    All,
    /// Keys starting with the given literal prefix.
    Prefix(String),
}

impl KeyPattern {
    /// Glob form understood by Redis `SCAN MATCH`.
    ///
    /// Glob metacharacters in the prefix are escaped so a tenant id is
    /// always matched literally.
    pub fn to_glob(&self) -> String {
        match self {
            Self::All => "*".to_string(),
            Self::Prefix(prefix) => {
                let mut glob = String::with_capacity(prefix.len() + 1);
                for c in prefix.chars() {
                    if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                        glob.push('\\');
                    }
                    glob.push(c);
                }
                glob.push('*');
                glob
            }
        }
    }

    /// Whether `key` matches this pattern.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::All => true,
            Self::Prefix(prefix) => key.starts_with(prefix.as_str()),
        }
    }
}

/// An open handle to one backend namespace.
///
/// Implementations must be thread-safe; the store shares one handle across
/// concurrent calls.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetch raw bytes, `None` when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    /// Write raw bytes. `None` TTL means the entry never expires.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>)
        -> Result<(), BackendError>;

    /// List the keys matching `pattern`. Order is unspecified.
    async fn enumerate_keys(&self, pattern: &KeyPattern) -> Result<Vec<String>, BackendError>;

    /// Remove a key. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), BackendError>;

    /// Number of keys in the namespace.
    async fn count(&self) -> Result<u64, BackendError>;

    /// Remove every key in the namespace.
    async fn flush_namespace(&self) -> Result<(), BackendError>;

    /// Release the handle. Closing twice is not an error.
    async fn close(&self) -> Result<(), BackendError>;
}

/// Opens backend handles.
pub trait Connector: Send + Sync {
    type Handle: Backend + 'static;

    /// Fixed type tag used in descriptors, e.g. `"redis"`.
    fn store_type(&self) -> &'static str;

    /// Create a handle for `config`.
    ///
    /// Connecting is lazy: an unreachable backend is only reported by the
    /// first operation on the handle.
    fn connect(&self, config: &ConnectionConfig) -> Result<Self::Handle, BackendError>;
}
