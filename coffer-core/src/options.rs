//! Option bags and the option steps that build them.
//!
//! Every configurable thing (the store itself, and each Get / Set / List /
//! Delete call) is described by a bag that starts from its zero value. A
//! sequence of option steps is applied left to right; each step may reject
//! the bag. The first rejection stops application and is returned to the
//! caller. Steps applied before the rejection stay applied, but the caller
//! never proceeds with a bag that failed.
//!
//! # Example
//!
//! ```ignore
//! let opts = SetOptions::from_options([
//!     SetOption::key_value("tenant1-session", "token"),
//!     SetOption::expiration(Duration::from_secs(300)),
//! ])?;
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::crypto::CryptoService;
use crate::error::{ConfigError, ConfigResult};
use crate::value::CacheValue;

/// Default TTL for `set` when no expiration step is given.
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(60);

/// A single configuration step applied to a bag of type `T`.
pub trait ConfigOption<T> {
    /// Apply this step to `target`, or reject it.
    fn apply(self, target: &mut T) -> ConfigResult<()>;
}

/// Apply `options` to `target` in order, stopping at the first rejection.
pub fn apply_options<T, O, I>(target: &mut T, options: I) -> ConfigResult<()>
where
    O: ConfigOption<T>,
    I: IntoIterator<Item = O>,
{
    for option in options {
        option.apply(target)?;
    }
    Ok(())
}

/// A caller-defined step.
pub type CustomStep<T> = Box<dyn FnOnce(&mut T) -> ConfigResult<()> + Send>;

fn require_key(field: &str, key: &str) -> ConfigResult<()> {
    if key.is_empty() {
        return Err(ConfigError::invalid(field, "must not be empty"));
    }
    Ok(())
}

// ============================================================================
// STORE OPTIONS
// ============================================================================

/// Caller-defined metadata attached to a store, kept in key order.
///
/// The store never interprets attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(BTreeMap<String, CacheValue>);

impl Attributes {
    pub fn get(&self, name: &str) -> Option<&CacheValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CacheValue)> {
        self.0.iter()
    }

    fn insert(&mut self, name: String, value: CacheValue) {
        self.0.insert(name, value);
    }
}

/// Per-instance store configuration.
///
/// The presence of a crypto service is the only switch that turns on
/// envelope encryption. Once the store is initialized the options are only
/// reachable through a shared borrow, so the encryption policy cannot change
/// for the life of the store.
#[derive(Clone, Default)]
pub struct StoreOptions {
    attributes: Attributes,
    crypto_service: Option<Arc<dyn CryptoService>>,
}

impl StoreOptions {
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn crypto_service(&self) -> Option<&Arc<dyn CryptoService>> {
        self.crypto_service.as_ref()
    }

    /// Whether values are encrypted before they reach the backend.
    pub fn encryption_enabled(&self) -> bool {
        self.crypto_service.is_some()
    }

    /// Insert or overwrite an attribute.
    pub fn set_attribute(
        &mut self,
        name: impl Into<String>,
        value: impl Into<CacheValue>,
    ) -> ConfigResult<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConfigError::invalid("attribute", "name must not be empty"));
        }
        self.attributes.insert(name, value.into());
        Ok(())
    }

    /// Attach the encryption capability.
    pub fn set_crypto_service(&mut self, service: Arc<dyn CryptoService>) -> ConfigResult<()> {
        if !service.is_available() {
            return Err(ConfigError::OptionRejected {
                option: "crypto_service".to_string(),
                reason: "service is unavailable".to_string(),
            });
        }
        self.crypto_service = Some(service);
        Ok(())
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("attributes", &self.attributes)
            .field("encryption_enabled", &self.encryption_enabled())
            .finish()
    }
}

/// Steps accepted by store construction and `init`.
pub enum StoreOption {
    Attribute { name: String, value: CacheValue },
    CryptoService(Arc<dyn CryptoService>),
    Custom(CustomStep<StoreOptions>),
}

impl StoreOption {
    pub fn attribute(name: impl Into<String>, value: impl Into<CacheValue>) -> Self {
        Self::Attribute {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn crypto_service(service: Arc<dyn CryptoService>) -> Self {
        Self::CryptoService(service)
    }

    pub fn custom(
        step: impl FnOnce(&mut StoreOptions) -> ConfigResult<()> + Send + 'static,
    ) -> Self {
        Self::Custom(Box::new(step))
    }
}

impl ConfigOption<StoreOptions> for StoreOption {
    fn apply(self, target: &mut StoreOptions) -> ConfigResult<()> {
        match self {
            Self::Attribute { name, value } => target.set_attribute(name, value),
            Self::CryptoService(service) => target.set_crypto_service(service),
            Self::Custom(step) => step(target),
        }
    }
}

impl fmt::Debug for StoreOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute { name, value } => f
                .debug_struct("Attribute")
                .field("name", name)
                .field("value", value)
                .finish(),
            Self::CryptoService(_) => write!(f, "CryptoService(..)"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

// ============================================================================
// GET OPTIONS
// ============================================================================

/// Parameters of a single `get` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    key: String,
}

impl GetOptions {
    /// Apply `options` and check that a key was given.
    pub fn from_options(options: impl IntoIterator<Item = GetOption>) -> ConfigResult<Self> {
        let mut opts = Self::default();
        apply_options(&mut opts, options)?;
        if opts.key.is_empty() {
            return Err(ConfigError::missing("key"));
        }
        Ok(opts)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn set_key(&mut self, key: impl Into<String>) -> ConfigResult<()> {
        let key = key.into();
        require_key("key", &key)?;
        self.key = key;
        Ok(())
    }
}

/// Steps accepted by `get`.
pub enum GetOption {
    Key(String),
    Custom(CustomStep<GetOptions>),
}

impl GetOption {
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(key.into())
    }

    pub fn custom(step: impl FnOnce(&mut GetOptions) -> ConfigResult<()> + Send + 'static) -> Self {
        Self::Custom(Box::new(step))
    }
}

impl ConfigOption<GetOptions> for GetOption {
    fn apply(self, target: &mut GetOptions) -> ConfigResult<()> {
        match self {
            Self::Key(key) => target.set_key(key),
            Self::Custom(step) => step(target),
        }
    }
}

// ============================================================================
// SET OPTIONS
// ============================================================================

/// Parameters of a single `set` call.
///
/// `expiration` defaults to [`DEFAULT_EXPIRATION`]. A zero duration means the
/// entry never expires.
#[derive(Debug, Clone, PartialEq)]
pub struct SetOptions {
    key: String,
    value: CacheValue,
    has_value: bool,
    expiration: Duration,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            key: String::new(),
            value: CacheValue::Null,
            has_value: false,
            expiration: DEFAULT_EXPIRATION,
        }
    }
}

impl SetOptions {
    /// Apply `options` and check that both key and value were given.
    pub fn from_options(options: impl IntoIterator<Item = SetOption>) -> ConfigResult<Self> {
        let mut opts = Self::default();
        apply_options(&mut opts, options)?;
        if opts.key.is_empty() {
            return Err(ConfigError::missing("key"));
        }
        if !opts.has_value {
            return Err(ConfigError::missing("value"));
        }
        Ok(opts)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &CacheValue {
        &self.value
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    /// The TTL to hand to the backend, `None` for "never expires".
    pub fn ttl(&self) -> Option<Duration> {
        if self.expiration.is_zero() {
            None
        } else {
            Some(self.expiration)
        }
    }

    pub fn set_key_value(
        &mut self,
        key: impl Into<String>,
        value: impl Into<CacheValue>,
    ) -> ConfigResult<()> {
        let key = key.into();
        require_key("key", &key)?;
        self.key = key;
        self.value = value.into();
        self.has_value = true;
        Ok(())
    }

    pub fn set_expiration(&mut self, expiration: Duration) -> ConfigResult<()> {
        self.expiration = expiration;
        Ok(())
    }
}

/// Steps accepted by `set`.
pub enum SetOption {
    KeyValue { key: String, value: CacheValue },
    Expiration(Duration),
    Custom(CustomStep<SetOptions>),
}

impl SetOption {
    pub fn key_value(key: impl Into<String>, value: impl Into<CacheValue>) -> Self {
        Self::KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn expiration(expiration: Duration) -> Self {
        Self::Expiration(expiration)
    }

    pub fn custom(step: impl FnOnce(&mut SetOptions) -> ConfigResult<()> + Send + 'static) -> Self {
        Self::Custom(Box::new(step))
    }
}

impl ConfigOption<SetOptions> for SetOption {
    fn apply(self, target: &mut SetOptions) -> ConfigResult<()> {
        match self {
            Self::KeyValue { key, value } => target.set_key_value(key, value),
            Self::Expiration(expiration) => target.set_expiration(expiration),
            Self::Custom(step) => step(target),
        }
    }
}

// ============================================================================
// LIST OPTIONS
// ============================================================================

/// Parameters of a single `list` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    tenant_uuid: Option<String>,
}

impl ListOptions {
    pub fn from_options(options: impl IntoIterator<Item = ListOption>) -> ConfigResult<Self> {
        let mut opts = Self::default();
        apply_options(&mut opts, options)?;
        Ok(opts)
    }

    /// The tenant filter, if any.
    pub fn tenant_uuid(&self) -> Option<&str> {
        self.tenant_uuid.as_deref()
    }

    /// Set the tenant filter. An empty tenant clears it.
    pub fn set_tenant_uuid(&mut self, tenant: impl fmt::Display) -> ConfigResult<()> {
        let tenant = tenant.to_string();
        self.tenant_uuid = if tenant.is_empty() { None } else { Some(tenant) };
        Ok(())
    }
}

/// Steps accepted by `list`.
pub enum ListOption {
    TenantUuid(String),
    Custom(CustomStep<ListOptions>),
}

impl ListOption {
    /// Restrict the listing to keys of the form `"<tenant>-..."`.
    pub fn tenant_uuid(tenant: impl fmt::Display) -> Self {
        Self::TenantUuid(tenant.to_string())
    }

    pub fn custom(
        step: impl FnOnce(&mut ListOptions) -> ConfigResult<()> + Send + 'static,
    ) -> Self {
        Self::Custom(Box::new(step))
    }
}

impl ConfigOption<ListOptions> for ListOption {
    fn apply(self, target: &mut ListOptions) -> ConfigResult<()> {
        match self {
            Self::TenantUuid(tenant) => target.set_tenant_uuid(tenant),
            Self::Custom(step) => step(target),
        }
    }
}

// ============================================================================
// DELETE OPTIONS
// ============================================================================

/// Parameters of a single `delete` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    key: String,
}

impl DeleteOptions {
    pub fn from_options(options: impl IntoIterator<Item = DeleteOption>) -> ConfigResult<Self> {
        let mut opts = Self::default();
        apply_options(&mut opts, options)?;
        if opts.key.is_empty() {
            return Err(ConfigError::missing("key"));
        }
        Ok(opts)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn set_key(&mut self, key: impl Into<String>) -> ConfigResult<()> {
        let key = key.into();
        require_key("key", &key)?;
        self.key = key;
        Ok(())
    }
}

/// Steps accepted by `delete`.
pub enum DeleteOption {
    Key(String),
    Custom(CustomStep<DeleteOptions>),
}

impl DeleteOption {
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(key.into())
    }

    pub fn custom(
        step: impl FnOnce(&mut DeleteOptions) -> ConfigResult<()> + Send + 'static,
    ) -> Self {
        Self::Custom(Box::new(step))
    }
}

impl ConfigOption<DeleteOptions> for DeleteOption {
    fn apply(self, target: &mut DeleteOptions) -> ConfigResult<()> {
        match self {
            Self::Key(key) => target.set_key(key),
            Self::Custom(step) => step(target),
        }
    }
}
