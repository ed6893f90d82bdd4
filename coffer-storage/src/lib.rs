//! Coffer Storage - Cache Store Contract and Backends
//!
//! Glues option bags, the crypto envelope and a backend adapter into the
//! [`CacheStore`] contract.
//!
//! ```ignore
//! let mut store = RedisCacheStore::redis("localhost:6379", "", 0, [
//!     StoreOption::crypto_service(Arc::new(AesGcmCryptoService::new(&key)?)),
//! ])?;
//! store.init(vec![]).await?;
//!
//! store.set(vec![SetOption::key_value(scoped_key(tenant, "session"), "token")]).await?;
//! let (entries, total) = store.list(vec![ListOption::tenant_uuid(tenant)]).await?;
//! ```

pub mod backend;
pub mod envelope;
pub mod store;
pub mod tenant;

pub use backend::{Backend, Connector, KeyPattern, MemoryBackend, MemoryConnector};
#[cfg(feature = "redis")]
pub use backend::{RedisBackend, RedisConnector};
pub use envelope::Envelope;
#[cfg(feature = "redis")]
pub use store::RedisCacheStore;
pub use store::{CacheStore, KvCacheStore, MemoryCacheStore};
pub use tenant::{belongs_to, scoped_key, tenant_prefix};

// Re-export the core types callers need alongside the store.
pub use coffer_core::{
    AesGcmCryptoService, CacheEntry, CacheStoreInfo, CacheValue, CofferError, CofferResult,
    ConnectionConfig, CryptoService, DeleteOption, GetOption, ListOption, SetOption, StoreOption,
    StoreOptions,
};
