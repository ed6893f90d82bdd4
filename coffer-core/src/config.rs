//! Backend connection configuration.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::{ConfigError, ConfigResult};

/// Default backend address.
pub const DEFAULT_ADDRESS: &str = "localhost:6379";

const DEFAULT_PORT: u16 = 6379;

/// Where and how to reach the key-value backend.
///
/// The password is held as a [`SecretString`]; neither `Debug` nor the
/// descriptor ever prints it.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// `host:port` of the backend.
    pub address: String,
    /// Optional ACL user name. Empty means "no user".
    pub username: String,
    pub password: Option<SecretString>,
    /// Logical database / namespace number.
    pub namespace: i64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            username: String::new(),
            password: None,
            namespace: 0,
        }
    }
}

impl ConnectionConfig {
    /// Build a config from address, password and namespace.
    ///
    /// An empty password means "no password".
    pub fn new(address: impl Into<String>, password: impl Into<String>, namespace: i64) -> Self {
        let password = password.into();
        Self {
            address: address.into(),
            username: String::new(),
            password: if password.is_empty() {
                None
            } else {
                Some(SecretString::new(password.into()))
            },
            namespace,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Parse `redis://[user[:password]@]host[:port][/db]`.
    ///
    /// TLS (`rediss://`) is not supported and is rejected rather than
    /// downgraded to plaintext.
    pub fn from_url(raw: &str) -> ConfigResult<Self> {
        let url = Url::parse(raw).map_err(|e| ConfigError::invalid("url", e.to_string()))?;

        match url.scheme() {
            "redis" => {}
            "rediss" => {
                return Err(ConfigError::invalid(
                    "url",
                    "TLS connections (rediss) are not supported",
                ))
            }
            other => {
                return Err(ConfigError::invalid(
                    "url",
                    format!("unsupported scheme '{}'", other),
                ))
            }
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::missing("url host"))?;
        let port = url.port().unwrap_or(DEFAULT_PORT);

        let namespace = match url.path().trim_start_matches('/') {
            "" => 0,
            db => db
                .parse::<i64>()
                .map_err(|_| ConfigError::invalid("url db", format!("'{}' is not a number", db)))?,
        };

        let password = url
            .password()
            .filter(|p| !p.is_empty())
            .map(|p| SecretString::new(p.into()));

        Ok(Self {
            address: format!("{}:{}", host, port),
            username: url.username().to_string(),
            password,
            namespace,
        })
    }

    /// Create connection configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `COFFER_CACHE_URL`: full connection URL; takes precedence over the rest
    /// - `COFFER_CACHE_ADDR`: `host:port` (default: `localhost:6379`)
    /// - `COFFER_CACHE_USERNAME`: ACL user name
    /// - `COFFER_CACHE_PASSWORD`: password
    /// - `COFFER_CACHE_DB`: namespace number (default: 0)
    pub fn from_env() -> ConfigResult<Self> {
        if let Ok(url) = std::env::var("COFFER_CACHE_URL") {
            if !url.trim().is_empty() {
                return Self::from_url(url.trim());
            }
        }

        let namespace = match std::env::var("COFFER_CACHE_DB") {
            Ok(db) if !db.trim().is_empty() => db.trim().parse::<i64>().map_err(|_| {
                ConfigError::invalid("COFFER_CACHE_DB", format!("'{}' is not a number", db))
            })?,
            _ => 0,
        };

        let address = std::env::var("COFFER_CACHE_ADDR")
            .ok()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());
        let password = std::env::var("COFFER_CACHE_PASSWORD").unwrap_or_default();
        let username = std::env::var("COFFER_CACHE_USERNAME").unwrap_or_default();

        Ok(Self::new(address, password, namespace).with_username(username))
    }

    /// Redacted descriptor: `<store_type>://<user>:***@<address>/<namespace>`.
    pub fn descriptor(&self, store_type: &str) -> String {
        format!(
            "{}://{}:***@{}/{}",
            store_type, self.username, self.address, self.namespace
        )
    }

    /// The plaintext password, if any. Only backend adapters should call this.
    pub fn expose_password(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.expose_secret())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("namespace", &self.namespace)
            .finish()
    }
}
