//! Cache value type.
//!
//! Values crossing the store boundary are heterogeneous: strings, booleans,
//! numbers and nested mappings all share one keyspace. [`CacheValue`] is the
//! tagged variant that carries them with static typing.
//!
//! # Canonical Encoding
//!
//! The canonical byte encoding is JSON. Numbers are always `f64`, so an
//! integer written as `42` reads back as `42.0`. Callers comparing numeric
//! values should compare against floats.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// A value stored in the cache.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<CacheValue>),
    Map(BTreeMap<String, CacheValue>),
}

impl CacheValue {
    /// Build an empty mapping value.
    pub fn map() -> Self {
        Self::Map(BTreeMap::new())
    }

    /// Insert into a mapping value, returning it for chaining.
    ///
    /// Non-mapping values are replaced by a fresh mapping.
    pub fn with_entry(self, key: impl Into<String>, value: impl Into<CacheValue>) -> Self {
        let mut map = match self {
            Self::Map(map) => map,
            _ => BTreeMap::new(),
        };
        map.insert(key.into(), value.into());
        Self::Map(map)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[CacheValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, CacheValue>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a field of a mapping value.
    pub fn get(&self, key: &str) -> Option<&CacheValue> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Whether every number in the value, nested ones included, is finite.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Number(n) => n.is_finite(),
            Self::List(items) => items.iter().all(Self::is_finite),
            Self::Map(map) => map.values().all(Self::is_finite),
            _ => true,
        }
    }

    /// Encode to the canonical JSON bytes.
    ///
    /// JSON has no NaN or infinity, so values holding one are rejected
    /// instead of being written as `null`.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, CodecError> {
        if !self.is_finite() {
            return Err(CodecError::Serialize {
                reason: "non-finite number".to_string(),
            });
        }
        serde_json::to_vec(self).map_err(|e| CodecError::Serialize {
            reason: e.to_string(),
        })
    }

    /// Decode from canonical JSON bytes.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Deserialize {
            reason: e.to_string(),
        })
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<&str> for CacheValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for CacheValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for CacheValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for CacheValue {
                fn from(value: $ty) -> Self {
                    Self::Number(value as f64)
                }
            }
        )*
    };
}

impl_from_number!(f64, f32, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl<T: Into<CacheValue>> From<Option<T>> for CacheValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

impl<T: Into<CacheValue>> From<Vec<T>> for CacheValue {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<CacheValue>> From<BTreeMap<String, T>> for CacheValue {
    fn from(value: BTreeMap<String, T>) -> Self {
        Self::Map(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<CacheValue>> From<HashMap<String, T>> for CacheValue {
    fn from(value: HashMap<String, T>) -> Self {
        Self::Map(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl From<serde_json::Value> for CacheValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number).unwrap_or(Self::Null),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Into::into).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<CacheValue> for serde_json::Value {
    fn from(value: CacheValue) -> Self {
        match value {
            CacheValue::Null => serde_json::Value::Null,
            CacheValue::Bool(b) => serde_json::Value::Bool(b),
            CacheValue::Number(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            CacheValue::String(s) => serde_json::Value::String(s),
            CacheValue::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            CacheValue::Map(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}
