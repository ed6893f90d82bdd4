//! In-process backend adapter.
//!
//! Keyspaces are keyed by namespace number and shared by every clone of a
//! [`MemoryConnector`], so two stores opened on the same namespace see the
//! same entries. Expired entries are dropped lazily on access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use coffer_core::{BackendError, ConnectionConfig};

use super::{Backend, Connector, KeyPattern};

const STORE_TYPE: &str = "memory";

#[derive(Debug, Clone)]
struct Slot {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

type Keyspace = Arc<RwLock<HashMap<String, Slot>>>;

/// Connector for in-process keyspaces.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    namespaces: Arc<Mutex<HashMap<i64, Keyspace>>>,
    unreachable: bool,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector whose handles fail every operation with a connection
    /// error, the way a lazily connected client behaves against a dead host.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    fn keyspace(&self, namespace: i64) -> Result<Keyspace, BackendError> {
        let mut namespaces = self.namespaces.lock().map_err(|e| BackendError::Connection {
            backend: STORE_TYPE.to_string(),
            reason: e.to_string(),
        })?;
        Ok(namespaces.entry(namespace).or_default().clone())
    }
}

impl Connector for MemoryConnector {
    type Handle = MemoryBackend;

    fn store_type(&self) -> &'static str {
        STORE_TYPE
    }

    fn connect(&self, config: &ConnectionConfig) -> Result<MemoryBackend, BackendError> {
        Ok(MemoryBackend {
            data: self.keyspace(config.namespace)?,
            address: config.address.clone(),
            unreachable: self.unreachable,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// Handle to one in-process keyspace.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    data: Keyspace,
    address: String,
    unreachable: bool,
    closed: Arc<AtomicBool>,
}

impl MemoryBackend {
    fn check_open(&self) -> Result<(), BackendError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BackendError::HandleClosed);
        }
        if self.unreachable {
            return Err(BackendError::Connection {
                backend: STORE_TYPE.to_string(),
                reason: format!("{} is unreachable", self.address),
            });
        }
        Ok(())
    }

    fn poisoned(command: &str, err: impl std::fmt::Display) -> BackendError {
        BackendError::command(command, err)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.check_open()?;
        let now = Instant::now();
        {
            let data = self.data.read().map_err(|e| Self::poisoned("GET", e))?;
            match data.get(key) {
                Some(slot) if slot.is_live(now) => return Ok(Some(slot.value.clone())),
                None => return Ok(None),
                Some(_) => {}
            }
        }

        // Expired: drop it unless it was rewritten in the meantime.
        let mut data = self.data.write().map_err(|e| Self::poisoned("GET", e))?;
        if data.get(key).is_some_and(|slot| !slot.is_live(now)) {
            data.remove(key);
        }
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), BackendError> {
        self.check_open()?;
        // A deadline past the clock's range never expires.
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        let mut data = self.data.write().map_err(|e| Self::poisoned("SET", e))?;
        data.insert(key.to_string(), Slot { value, expires_at });
        Ok(())
    }

    async fn enumerate_keys(&self, pattern: &KeyPattern) -> Result<Vec<String>, BackendError> {
        self.check_open()?;
        let now = Instant::now();
        let data = self.data.read().map_err(|e| Self::poisoned("SCAN", e))?;
        Ok(data
            .iter()
            .filter(|(key, slot)| slot.is_live(now) && pattern.matches(key))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.check_open()?;
        let mut data = self.data.write().map_err(|e| Self::poisoned("DEL", e))?;
        data.remove(key);
        Ok(())
    }

    async fn count(&self) -> Result<u64, BackendError> {
        self.check_open()?;
        let now = Instant::now();
        let mut data = self.data.write().map_err(|e| Self::poisoned("DBSIZE", e))?;
        data.retain(|_, slot| slot.is_live(now));
        Ok(data.len() as u64)
    }

    async fn flush_namespace(&self) -> Result<(), BackendError> {
        self.check_open()?;
        let mut data = self.data.write().map_err(|e| Self::poisoned("FLUSHDB", e))?;
        data.clear();
        Ok(())
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(connector: &MemoryConnector, namespace: i64) -> MemoryBackend {
        let config = ConnectionConfig::new("local", "", namespace);
        connector.connect(&config).unwrap()
    }

    #[tokio::test]
    async fn test_basic_operations() {
        let backend = connect(&MemoryConnector::new(), 0);

        backend.set("key1", b"value1".to_vec(), None).await.unwrap();
        assert_eq!(backend.get("key1").await.unwrap(), Some(b"value1".to_vec()));
        assert_eq!(backend.get("nonexistent").await.unwrap(), None);

        backend.delete("key1").await.unwrap();
        assert_eq!(backend.get("key1").await.unwrap(), None);
        backend.delete("key1").await.unwrap();
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated_and_shared_by_clones() {
        let connector = MemoryConnector::new();
        let a = connect(&connector, 0);
        let b = connect(&connector.clone(), 0);
        let other = connect(&connector, 1);

        a.set("k", b"v".to_vec(), None).await.unwrap();
        assert_eq!(b.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(other.get("k").await.unwrap(), None);
        assert_eq!(other.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let backend = connect(&MemoryConnector::new(), 0);
        backend
            .set("short", b"v".to_vec(), Some(Duration::from_millis(20)))
            .await
            .unwrap();
        backend.set("long", b"v".to_vec(), None).await.unwrap();
        assert_eq!(backend.count().await.unwrap(), 2);

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(backend.get("short").await.unwrap(), None);
        assert_eq!(backend.enumerate_keys(&KeyPattern::All).await.unwrap(), vec!["long"]);
        assert_eq!(backend.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_never_expires() {
        let backend = connect(&MemoryConnector::new(), 0);
        backend
            .set("forever", b"v".to_vec(), Some(Duration::MAX))
            .await
            .unwrap();
        assert_eq!(backend.get("forever").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(backend.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_enumerate_with_prefix() {
        let backend = connect(&MemoryConnector::new(), 0);
        for key in ["prefix:a", "prefix:b", "other:c"] {
            backend.set(key, b"1".to_vec(), None).await.unwrap();
        }

        let mut keys = backend
            .enumerate_keys(&KeyPattern::Prefix("prefix:".into()))
            .await
            .unwrap();
        keys.sort();
        assert_eq!(keys, vec!["prefix:a", "prefix:b"]);
    }

    #[tokio::test]
    async fn test_flush_and_close() {
        let backend = connect(&MemoryConnector::new(), 0);
        backend.set("k", b"v".to_vec(), None).await.unwrap();
        backend.flush_namespace().await.unwrap();
        assert_eq!(backend.count().await.unwrap(), 0);

        backend.close().await.unwrap();
        backend.close().await.unwrap();
        assert_eq!(backend.get("k").await.unwrap_err(), BackendError::HandleClosed);
    }

    #[tokio::test]
    async fn test_unreachable_connects_lazily() {
        let backend = connect(&MemoryConnector::unreachable(), 0);
        let err = backend.get("k").await.unwrap_err();
        assert!(matches!(err, BackendError::Connection { .. }));
    }
}
