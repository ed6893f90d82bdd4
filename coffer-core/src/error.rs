//! Error types for Coffer operations

use thiserror::Error;

/// Configuration errors raised while applying option steps.
///
/// These never reach a backend: a rejected option aborts the store
/// construction, the `init` call or the data call before any I/O happens.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Required field missing: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Option {option} rejected: {reason}")]
    OptionRejected { option: String, reason: String },
}

impl ConfigError {
    /// Shorthand for a missing required field.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingRequired {
            field: field.into(),
        }
    }

    /// Shorthand for an invalid field value.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Failures reported by a [`CryptoService`](crate::CryptoService).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("crypto service unavailable")]
    Unavailable,

    #[error("invalid key: {reason}")]
    InvalidKey { reason: String },

    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    #[error("decryption failed: {reason}")]
    DecryptionFailed { reason: String },
}

/// Value (de)serialization errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("serialize: {reason}")]
    Serialize { reason: String },

    #[error("deserialize: {reason}")]
    Deserialize { reason: String },
}

/// Failures of the encrypt-on-write / decrypt-on-read pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("failed to marshal value: {0}")]
    Marshal(#[source] CodecError),

    #[error("value is empty")]
    EmptyValue,

    #[error("failed to encrypt value: {0}")]
    Encrypt(#[source] CryptoError),

    #[error("encrypted value is empty")]
    EmptyCiphertext,

    #[error("failed to decrypt value: {0}")]
    Decrypt(#[source] CryptoError),

    #[error("failed to unmarshal value: {0}")]
    Unmarshal(#[source] CodecError),
}

/// Errors surfaced by a backend adapter. Propagated verbatim, never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Connection to {backend} failed: {reason}")]
    Connection { backend: String, reason: String },

    #[error("Command {command} failed: {reason}")]
    Command { command: String, reason: String },

    #[error("Backend handle closed")]
    HandleClosed,
}

impl BackendError {
    /// Build a command failure from any displayable error.
    pub fn command(command: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Command {
            command: command.into(),
            reason: err.to_string(),
        }
    }
}

/// Store lifecycle and envelope errors.
///
/// Every variant carries the redacted store descriptor so failures can be
/// traced to a backend/namespace pair without leaking credentials.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("'{store}' failed - store is not initialized")]
    NotReady { store: String },

    #[error("'{store}' failed - store is closed")]
    Closed { store: String },

    #[error("'{store}' failed - cannot {operation} in state {state}")]
    InvalidState {
        store: String,
        operation: String,
        state: String,
    },

    #[error("'{store}' failed - {source}")]
    Envelope {
        store: String,
        #[source]
        source: EnvelopeError,
    },
}

/// Master error type for all Coffer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CofferError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CofferError {
    /// True when an option step or required field rejected the call.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// True when the backend adapter reported the failure.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }

    /// True when the store was used outside the Ready state.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::Store(
                StoreError::NotReady { .. }
                    | StoreError::Closed { .. }
                    | StoreError::InvalidState { .. }
            )
        )
    }

    /// True when sealing or opening a value failed.
    pub fn is_envelope(&self) -> bool {
        matches!(self, Self::Store(StoreError::Envelope { .. }))
    }
}

/// Result type alias for Coffer operations.
pub type CofferResult<T> = Result<T, CofferError>;

/// Result type alias for option application.
pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display_missing() {
        let err = ConfigError::missing("key");
        assert_eq!(format!("{}", err), "Required field missing: key");
    }

    #[test]
    fn test_envelope_error_carries_store_context() {
        let err = StoreError::Envelope {
            store: "redis://:***@localhost:6379/0".to_string(),
            source: EnvelopeError::Decrypt(CryptoError::DecryptionFailed {
                reason: "tag mismatch".to_string(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("'redis://:***@localhost:6379/0' failed"));
        assert!(msg.contains("failed to decrypt value"));
    }

    #[test]
    fn test_master_error_from_conversions() {
        let err: CofferError = ConfigError::missing("key").into();
        assert!(err.is_config());
        assert!(!err.is_backend());

        let err: CofferError = BackendError::HandleClosed.into();
        assert!(err.is_backend());

        let err: CofferError = StoreError::NotReady {
            store: "memory://:***@local/0".to_string(),
        }
        .into();
        assert!(err.is_lifecycle());
        assert!(!err.is_envelope());
    }

    #[test]
    fn test_backend_command_helper() {
        let err = BackendError::command("GET", "connection refused");
        assert_eq!(err.to_string(), "Command GET failed: connection refused");
    }
}
