//! Cache store contract and its key-value implementation.
//!
//! A store moves through `Uninitialized -> Ready -> Closed`. Construction
//! applies the first batch of store options; `init` applies the deferred
//! batch and opens the backend handle. Data operations are only valid while
//! the store is Ready.
//!
//! # Encryption
//!
//! When a crypto service is configured, values are sealed before `set`
//! writes them and opened after `get` / `list` read them. A value that fails
//! to open is fatal to `get` but is skipped by `list`: **`list` may silently
//! omit entries that fail to decrypt** (each skip is logged at `warn`).
//!
//! # Cancellation
//!
//! Every data operation is a plain future. Drop it, or wrap it in
//! `tokio::time::timeout`, to abandon the call.

use std::fmt;

use async_trait::async_trait;
use coffer_core::{
    apply_options, CacheEntry, CacheStoreInfo, CofferResult, ConnectionConfig, DeleteOption,
    DeleteOptions, EnvelopeError, GetOption, GetOptions, ListOption, ListOptions, SetOption,
    SetOptions, StoreError, StoreOption, StoreOptions,
};
use tracing::{debug, info, warn};

use crate::backend::{Backend, Connector, MemoryConnector};
use crate::envelope::Envelope;
use crate::tenant;

/// Uniform cache store contract.
#[async_trait]
pub trait CacheStore: fmt::Display + Send + Sync {
    /// Apply deferred options and open the backend handle.
    async fn init(&mut self, options: Vec<StoreOption>) -> CofferResult<()>;

    /// Fetch one entry. `Ok(None)` when the key is absent or expired.
    async fn get(&self, options: Vec<GetOption>) -> CofferResult<Option<CacheEntry>>;

    /// Write one entry, replacing any previous value for the key.
    async fn set(&self, options: Vec<SetOption>) -> CofferResult<()>;

    /// Enumerate entries, optionally restricted to one tenant.
    ///
    /// Returns the entries and their count. Entries that fail to decrypt
    /// are omitted. No ordering is guaranteed.
    async fn list(&self, options: Vec<ListOption>) -> CofferResult<(Vec<CacheEntry>, u64)>;

    /// Remove one entry. Succeeds whenever the options are valid.
    async fn delete(&self, options: Vec<DeleteOption>) -> CofferResult<()>;

    /// Entry count of the namespace, 0 when unknown.
    async fn total(&self) -> u64;

    /// Snapshot of type, size and redacted connection descriptor.
    async fn info(&self) -> CacheStoreInfo;

    /// Remove every entry of the namespace. Irreversible.
    async fn reset(&self) -> CofferResult<()>;

    /// Release the backend handle. A no-op unless the store is Ready.
    async fn close(&mut self) -> CofferResult<()>;

    /// The effective store options.
    fn options(&self) -> &StoreOptions;
}

enum State<H> {
    Uninitialized,
    Ready(H),
    Closed,
}

impl<H> State<H> {
    fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "Uninitialized",
            Self::Ready(_) => "Ready",
            Self::Closed => "Closed",
        }
    }
}

/// [`CacheStore`] over any backend [`Connector`].
pub struct KvCacheStore<C: Connector> {
    connector: C,
    config: ConnectionConfig,
    descriptor: String,
    options: StoreOptions,
    envelope: Envelope,
    state: State<C::Handle>,
}

/// Store backed by an in-process keyspace.
pub type MemoryCacheStore = KvCacheStore<MemoryConnector>;

#[cfg(feature = "redis")]
/// Store backed by a Redis server.
pub type RedisCacheStore = KvCacheStore<crate::backend::RedisConnector>;

#[cfg(feature = "redis")]
impl KvCacheStore<crate::backend::RedisConnector> {
    /// Build a Redis store from address (`host:port`), password and db.
    pub fn redis(
        address: impl Into<String>,
        password: impl Into<String>,
        db: i64,
        options: impl IntoIterator<Item = StoreOption>,
    ) -> CofferResult<Self> {
        Self::new(
            crate::backend::RedisConnector::new(),
            ConnectionConfig::new(address, password, db),
            options,
        )
    }
}

impl<C: Connector> KvCacheStore<C> {
    /// Build a store. Fails if any option rejects.
    ///
    /// No connection is made until [`CacheStore::init`].
    pub fn new(
        connector: C,
        config: ConnectionConfig,
        options: impl IntoIterator<Item = StoreOption>,
    ) -> CofferResult<Self> {
        let mut store_options = StoreOptions::default();
        apply_options(&mut store_options, options)?;

        let descriptor = config.descriptor(connector.store_type());
        Ok(Self {
            connector,
            config,
            descriptor,
            envelope: Envelope::from_options(&store_options),
            options: store_options,
            state: State::Uninitialized,
        })
    }

    /// The connection configuration this store was built with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// The open backend handle, if Ready.
    pub fn backend(&self) -> Option<&C::Handle> {
        match &self.state {
            State::Ready(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    fn ready(&self) -> Result<&C::Handle, StoreError> {
        match &self.state {
            State::Ready(handle) => Ok(handle),
            State::Uninitialized => Err(StoreError::NotReady {
                store: self.descriptor.clone(),
            }),
            State::Closed => Err(StoreError::Closed {
                store: self.descriptor.clone(),
            }),
        }
    }

    fn envelope_error(&self, source: EnvelopeError) -> StoreError {
        StoreError::Envelope {
            store: self.descriptor.clone(),
            source,
        }
    }
}

#[async_trait]
impl<C: Connector> CacheStore for KvCacheStore<C> {
    async fn init(&mut self, options: Vec<StoreOption>) -> CofferResult<()> {
        if !matches!(self.state, State::Uninitialized) {
            return Err(StoreError::InvalidState {
                store: self.descriptor.clone(),
                operation: "init".to_string(),
                state: self.state.name().to_string(),
            }
            .into());
        }

        apply_options(&mut self.options, options)?;
        self.envelope = Envelope::from_options(&self.options);

        let handle = self.connector.connect(&self.config)?;
        self.state = State::Ready(handle);
        info!(
            store = %self.descriptor,
            encrypted = self.envelope.is_sealed(),
            "Cache store initialized"
        );
        Ok(())
    }

    async fn get(&self, options: Vec<GetOption>) -> CofferResult<Option<CacheEntry>> {
        let opts = GetOptions::from_options(options)?;
        let backend = self.ready()?;
        debug!(store = %self.descriptor, key = opts.key(), "get");

        let Some(raw) = backend.get(opts.key()).await? else {
            return Ok(None);
        };
        let value = self
            .envelope
            .open(&raw)
            .map_err(|source| self.envelope_error(source))?;
        Ok(Some(CacheEntry::new(opts.key(), value)))
    }

    async fn set(&self, options: Vec<SetOption>) -> CofferResult<()> {
        let opts = SetOptions::from_options(options)?;
        let backend = self.ready()?;
        debug!(
            store = %self.descriptor,
            key = opts.key(),
            ttl_ms = opts.ttl().map(|ttl| ttl.as_millis() as u64),
            "set"
        );

        let raw = self
            .envelope
            .seal(opts.value())
            .map_err(|source| self.envelope_error(source))?;
        backend.set(opts.key(), raw, opts.ttl()).await?;
        Ok(())
    }

    async fn list(&self, options: Vec<ListOption>) -> CofferResult<(Vec<CacheEntry>, u64)> {
        let opts = ListOptions::from_options(options)?;
        let backend = self.ready()?;
        let tenant = opts.tenant_uuid();
        debug!(store = %self.descriptor, tenant, "list");

        let keys = backend
            .enumerate_keys(&tenant::key_pattern(tenant))
            .await?;

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(tenant) = tenant {
                if !tenant::belongs_to(&key, tenant) {
                    continue;
                }
            }

            // The key may have expired or been deleted since enumeration.
            let Some(raw) = backend.get(&key).await? else {
                continue;
            };

            match self.envelope.open(&raw) {
                Ok(value) => entries.push(CacheEntry::new(key, value)),
                Err(e) => {
                    warn!(store = %self.descriptor, key = %key, error = %e, "Skipping unreadable entry");
                }
            }
        }

        let total = entries.len() as u64;
        Ok((entries, total))
    }

    async fn delete(&self, options: Vec<DeleteOption>) -> CofferResult<()> {
        let opts = DeleteOptions::from_options(options)?;
        let State::Ready(backend) = &self.state else {
            debug!(store = %self.descriptor, key = opts.key(), "delete without handle");
            return Ok(());
        };
        debug!(store = %self.descriptor, key = opts.key(), "delete");

        if let Err(e) = backend.delete(opts.key()).await {
            warn!(store = %self.descriptor, key = opts.key(), error = %e, "Delete failed");
        }
        Ok(())
    }

    async fn total(&self) -> u64 {
        let State::Ready(backend) = &self.state else {
            return 0;
        };
        match backend.count().await {
            Ok(count) => count,
            Err(e) => {
                warn!(store = %self.descriptor, error = %e, "Count failed");
                0
            }
        }
    }

    async fn info(&self) -> CacheStoreInfo {
        CacheStoreInfo {
            store_type: self.connector.store_type().to_string(),
            num_items: self.total().await,
            connection_info: self.descriptor.clone(),
        }
    }

    async fn reset(&self) -> CofferResult<()> {
        let backend = self.ready()?;
        info!(store = %self.descriptor, "Flushing namespace");
        backend.flush_namespace().await?;
        Ok(())
    }

    async fn close(&mut self) -> CofferResult<()> {
        // Closing an unopened or closed store changes nothing.
        let State::Ready(handle) = &self.state else {
            return Ok(());
        };
        // A failed close keeps the handle so the caller can retry.
        handle.close().await?;
        self.state = State::Closed;
        info!(store = %self.descriptor, "Cache store closed");
        Ok(())
    }

    fn options(&self) -> &StoreOptions {
        &self.options
    }
}

impl<C: Connector> fmt::Display for KvCacheStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor)
    }
}

impl<C: Connector> fmt::Debug for KvCacheStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvCacheStore")
            .field("descriptor", &self.descriptor)
            .field("options", &self.options)
            .field("state", &self.state.name())
            .finish()
    }
}
