//! Coffer Test Utilities
//!
//! Shared test infrastructure for the Coffer workspace:
//! - Mock crypto services with observable behavior
//! - Proptest generators for cache values, keys and tenants
//! - Fixtures for common scenarios
//! - Assertions for Coffer error categories

use std::sync::atomic::{AtomicUsize, Ordering};

pub use coffer_core::{
    AesGcmCryptoService, CacheEntry, CacheValue, CofferError, CofferResult, CryptoError,
    CryptoService, StoreError,
};

// ============================================================================
// MOCK CRYPTO SERVICES
// ============================================================================

/// Header prepended to every blob produced by [`MockCryptoService`].
pub const MOCK_MARKER: &[u8] = b"mock-sealed:";

/// Reversible, non-secure crypto service.
///
/// Ciphertexts are `MOCK_MARKER` followed by the plaintext XOR-ed with a
/// fixed byte, so the plaintext never appears verbatim in the backend.
/// Decrypting anything without the marker fails, which makes tampering easy
/// to simulate. Calls are counted.
#[derive(Debug, Default)]
pub struct MockCryptoService {
    encrypt_calls: AtomicUsize,
    decrypt_calls: AtomicUsize,
}

const MOCK_MASK: u8 = 0x5A;

impl MockCryptoService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encrypt_calls(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }
}

impl CryptoService for MockCryptoService {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        let mut out = Vec::with_capacity(MOCK_MARKER.len() + plaintext.len());
        out.extend_from_slice(MOCK_MARKER);
        out.extend(plaintext.iter().map(|b| b ^ MOCK_MASK));
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        let body = ciphertext
            .strip_prefix(MOCK_MARKER)
            .ok_or_else(|| CryptoError::DecryptionFailed {
                reason: "missing mock marker".to_string(),
            })?;
        Ok(body.iter().map(|b| b ^ MOCK_MASK).collect())
    }
}

/// Crypto service that reports itself unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableCryptoService;

impl CryptoService for UnavailableCryptoService {
    fn encrypt(&self, _plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Err(CryptoError::Unavailable)
    }

    fn decrypt(&self, _ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Err(CryptoError::Unavailable)
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Crypto service that is available but fails every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingCryptoService;

impl CryptoService for FailingCryptoService {
    fn encrypt(&self, _plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Err(CryptoError::EncryptionFailed {
            reason: "encryption disabled for test".to_string(),
        })
    }

    fn decrypt(&self, _ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Err(CryptoError::DecryptionFailed {
            reason: "decryption disabled for test".to_string(),
        })
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Coffer types.

    use super::*;
    use proptest::prelude::*;

    /// Integral numbers; JSON round-trips them exactly as `f64`.
    pub fn arb_number() -> impl Strategy<Value = CacheValue> {
        (-1_000_000_000i64..1_000_000_000).prop_map(|n| CacheValue::Number(n as f64))
    }

    pub fn arb_scalar() -> impl Strategy<Value = CacheValue> {
        prop_oneof![
            Just(CacheValue::Null),
            any::<bool>().prop_map(CacheValue::Bool),
            arb_number(),
            "[ -~]{0,64}".prop_map(CacheValue::String),
        ]
    }

    /// Nested values up to depth 3.
    pub fn arb_cache_value() -> impl Strategy<Value = CacheValue> {
        arb_scalar().prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..6).prop_map(CacheValue::List),
                proptest::collection::btree_map("[a-z_]{1,12}", inner, 0..6)
                    .prop_map(CacheValue::Map),
            ]
        })
    }

    /// Tenant ids as the hyphenated form of a UUID.
    pub fn arb_tenant() -> impl Strategy<Value = String> {
        any::<[u8; 16]>().prop_map(|bytes| uuid::Uuid::from_bytes(bytes).to_string())
    }

    /// Non-empty key suffixes.
    pub fn arb_key_suffix() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9:_]{1,24}"
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// 32-byte AES key used by tests.
    pub const TEST_KEY: &[u8; 32] = b"01234567890123456789012345678901";

    /// AES-256-GCM service over [`TEST_KEY`].
    pub fn aes_service() -> AesGcmCryptoService {
        match AesGcmCryptoService::new(TEST_KEY) {
            Ok(service) => service,
            Err(e) => panic!("test key rejected: {}", e),
        }
    }

    /// A credentials-shaped mapping value.
    pub fn credentials() -> CacheValue {
        CacheValue::map()
            .with_entry("username", "john_doe")
            .with_entry("password", "super_secret")
    }

    /// A string value of `len` bytes.
    pub fn large_string(len: usize) -> CacheValue {
        CacheValue::String("x".repeat(len))
    }

    /// Install a `tracing` subscriber honoring `RUST_LOG`. Safe to call from
    /// every test.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Coffer error categories.

    use super::*;

    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &CofferResult<T>) {
        match result {
            Err(CofferError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_envelope_error<T: std::fmt::Debug>(result: &CofferResult<T>) {
        match result {
            Err(CofferError::Store(StoreError::Envelope { .. })) => {}
            other => panic!("Expected Envelope error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_lifecycle_error<T: std::fmt::Debug>(result: &CofferResult<T>) {
        match result {
            Err(e) if e.is_lifecycle() => {}
            other => panic!("Expected lifecycle error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_backend_error<T: std::fmt::Debug>(result: &CofferResult<T>) {
        match result {
            Err(CofferError::Backend(_)) => {}
            other => panic!("Expected Backend error, got: {:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_crypto_roundtrip_and_counts() {
        let service = MockCryptoService::new();
        let sealed = service.encrypt(b"secret").unwrap();
        assert!(sealed.starts_with(MOCK_MARKER));
        assert!(!sealed.windows(6).any(|w| w == b"secret"));
        assert_eq!(service.decrypt(&sealed).unwrap(), b"secret");
        assert_eq!(service.encrypt_calls(), 1);
        assert_eq!(service.decrypt_calls(), 1);
    }

    #[test]
    fn test_mock_crypto_detects_tampering() {
        let service = MockCryptoService::new();
        assert!(service.decrypt(b"invalid encrypted data").is_err());
    }

    #[test]
    fn test_unavailable_service() {
        assert!(!UnavailableCryptoService.is_available());
        assert!(FailingCryptoService.is_available());
    }
}
