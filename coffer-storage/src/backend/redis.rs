//! Redis backend adapter.
//!
//! Uses one multiplexed connection per handle, opened on first use. Keys are
//! enumerated with a cursor-based `SCAN MATCH` loop rather than `KEYS`, so a
//! large namespace never blocks the server in one call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ::redis::aio::MultiplexedConnection;
use ::redis::Client;
use async_trait::async_trait;
use coffer_core::{BackendError, ConnectionConfig};
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use super::{Backend, Connector, KeyPattern};

const STORE_TYPE: &str = "redis";

/// Batch size hint passed to `SCAN ... COUNT`.
const SCAN_COUNT: usize = 100;

/// Connector for Redis servers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

impl RedisConnector {
    pub fn new() -> Self {
        Self
    }
}

/// Build the `redis://` URL for `config`. The result holds the plaintext
/// password and must not be logged.
fn connection_url(config: &ConnectionConfig) -> Result<Url, BackendError> {
    let invalid = |reason: String| BackendError::Connection {
        backend: STORE_TYPE.to_string(),
        reason,
    };

    let mut url = Url::parse(&format!("redis://{}", config.address))
        .map_err(|e| invalid(format!("invalid address '{}': {}", config.address, e)))?;
    url.set_path(&format!("/{}", config.namespace));
    if !config.username.is_empty() {
        url.set_username(&config.username)
            .map_err(|_| invalid("invalid username".to_string()))?;
    }
    if let Some(password) = config.expose_password() {
        url.set_password(Some(password))
            .map_err(|_| invalid("invalid password".to_string()))?;
    }
    Ok(url)
}

impl Connector for RedisConnector {
    type Handle = RedisBackend;

    fn store_type(&self) -> &'static str {
        STORE_TYPE
    }

    fn connect(&self, config: &ConnectionConfig) -> Result<RedisBackend, BackendError> {
        let url = connection_url(config)?;
        let client = Client::open(url.as_str()).map_err(|e| BackendError::Connection {
            backend: STORE_TYPE.to_string(),
            reason: e.to_string(),
        })?;
        Ok(RedisBackend {
            client,
            conn: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }
}

/// Handle to one Redis logical database.
pub struct RedisBackend {
    client: Client,
    conn: Mutex<Option<MultiplexedConnection>>,
    closed: AtomicBool,
}

impl RedisBackend {
    /// Get the shared connection, opening it on first use.
    async fn connection(&self) -> Result<MultiplexedConnection, BackendError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BackendError::HandleClosed);
        }
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BackendError::Connection {
                backend: STORE_TYPE.to_string(),
                reason: e.to_string(),
            })?;
        debug!("redis connection established");
        *guard = Some(conn.clone());
        Ok(conn)
    }
}

/// Largest TTL sent as `PX`. Redis rejects deadlines that overflow its
/// millisecond clock, so longer TTLs are written without expiry.
const MAX_TTL_MILLIS: u128 = (i64::MAX / 2) as u128;

/// Millisecond TTL for `SET ... PX`. Sub-millisecond TTLs round up to 1 ms.
fn ttl_millis(ttl: Duration) -> Option<u64> {
    let millis = ttl.as_millis();
    if millis > MAX_TTL_MILLIS {
        return None;
    }
    Some((millis as u64).max(1))
}

#[async_trait]
impl Backend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = ::redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| BackendError::command("GET", e))?;
        Ok(value)
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), BackendError> {
        let mut conn = self.connection().await?;
        let mut cmd = ::redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(millis) = ttl.and_then(ttl_millis) {
            cmd.arg("PX").arg(millis);
        }
        let _: () = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| BackendError::command("SET", e))?;
        Ok(())
    }

    async fn enumerate_keys(&self, pattern: &KeyPattern) -> Result<Vec<String>, BackendError> {
        let mut conn = self.connection().await?;
        let glob = pattern.to_glob();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = ::redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&glob)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(|e| BackendError::command("SCAN", e))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once across iterations.
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        let mut conn = self.connection().await?;
        let _: i64 = ::redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| BackendError::command("DEL", e))?;
        Ok(())
    }

    async fn count(&self) -> Result<u64, BackendError> {
        let mut conn = self.connection().await?;
        let count: u64 = ::redis::cmd("DBSIZE")
            .query_async(&mut conn)
            .await
            .map_err(|e| BackendError::command("DBSIZE", e))?;
        Ok(count)
    }

    async fn flush_namespace(&self) -> Result<(), BackendError> {
        let mut conn = self.connection().await?;
        let _: () = ::redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .map_err(|e| BackendError::command("FLUSHDB", e))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.closed.store(true, Ordering::Release);
        // Dropping the last clone of the multiplexed connection ends its driver task.
        self.conn.lock().await.take();
        Ok(())
    }
}
