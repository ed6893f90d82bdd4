//! Result models returned by the cache store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CacheValue;

/// One key-value pair held in the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: CacheValue,
    /// Expiration instant.
    ///
    /// Only meaningful at write time. Read paths do not reconstruct it from
    /// the backend's TTL state, so entries returned by `get` and `list`
    /// always carry `None`.
    pub expired_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: impl Into<CacheValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            expired_at: None,
        }
    }

    /// Consume the entry and return the value.
    pub fn into_value(self) -> CacheValue {
        self.value
    }
}

/// Read-only snapshot of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStoreInfo {
    /// Fixed backend type tag, e.g. `"redis"`.
    pub store_type: String,
    /// Entry count for the active namespace at snapshot time.
    pub num_items: u64,
    /// Redacted connection descriptor; credentials are masked.
    pub connection_info: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_has_no_expiry() {
        let entry = CacheEntry::new("k", "v");
        assert_eq!(entry.key, "k");
        assert_eq!(entry.value.as_str(), Some("v"));
        assert!(entry.expired_at.is_none());
    }

    #[test]
    fn test_info_serializes() {
        let info = CacheStoreInfo {
            store_type: "redis".to_string(),
            num_items: 2,
            connection_info: "redis://:***@localhost:6379/2".to_string(),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["store_type"], "redis");
        assert_eq!(json["num_items"], 2);
    }
}
