//! Cache store contract tests against the in-process backend.

use std::sync::Arc;
use std::time::Duration;

use coffer_core::{ConfigError, CryptoService};
use coffer_storage::{
    scoped_key, Backend, CacheStore, CacheValue, ConnectionConfig, DeleteOption, GetOption,
    KvCacheStore, ListOption, MemoryCacheStore, MemoryConnector, SetOption, StoreOption,
};
use coffer_test_utils::assertions::{
    assert_config_error, assert_envelope_error, assert_lifecycle_error,
};
use coffer_test_utils::fixtures::{aes_service, credentials, init_tracing, large_string};
use coffer_test_utils::generators::{arb_cache_value, arb_key_suffix, arb_tenant};
use coffer_test_utils::{
    FailingCryptoService, MockCryptoService, UnavailableCryptoService, MOCK_MARKER,
};
use proptest::prelude::*;

const PASSWORD: &str = "super_secret_password";

fn config() -> ConnectionConfig {
    ConnectionConfig::new("localhost:6379", PASSWORD, 2)
}

async fn ready_store(options: Vec<StoreOption>) -> MemoryCacheStore {
    init_tracing();
    let mut store = KvCacheStore::new(MemoryConnector::new(), config(), options).unwrap();
    store.init(vec![]).await.unwrap();
    store
}

async fn encrypted_store() -> MemoryCacheStore {
    ready_store(vec![StoreOption::crypto_service(Arc::new(aes_service()))]).await
}

async fn set(store: &MemoryCacheStore, key: &str, value: impl Into<CacheValue>) {
    store
        .set(vec![SetOption::key_value(key, value)])
        .await
        .unwrap();
}

async fn get(store: &MemoryCacheStore, key: &str) -> Option<CacheValue> {
    store
        .get(vec![GetOption::key(key)])
        .await
        .unwrap()
        .map(|entry| entry.into_value())
}

// ============================================================================
// BASIC OPERATIONS
// ============================================================================

#[tokio::test]
async fn test_get_unset_key_returns_none() {
    let store = ready_store(vec![]).await;
    assert_eq!(get(&store, "missing").await, None);
}

#[tokio::test]
async fn test_set_get_scalars() {
    let store = ready_store(vec![]).await;
    set(&store, "key1", "value1").await;
    set(&store, "key2", true).await;
    set(&store, "key3", 42).await;

    assert_eq!(get(&store, "key1").await, Some(CacheValue::from("value1")));
    assert_eq!(get(&store, "key2").await, Some(CacheValue::Bool(true)));
    assert_eq!(get(&store, "key3").await, Some(CacheValue::Number(42.0)));
}

#[tokio::test]
async fn test_get_returns_key_and_no_expiry() {
    let store = ready_store(vec![]).await;
    store
        .set(vec![
            SetOption::key_value("key1", "value1"),
            SetOption::expiration(Duration::from_secs(30)),
        ])
        .await
        .unwrap();

    let entry = store
        .get(vec![GetOption::key("key1")])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.key, "key1");
    assert!(entry.expired_at.is_none());
}

#[tokio::test]
async fn test_set_twice_is_idempotent() {
    let store = ready_store(vec![]).await;
    set(&store, "key1", "value1").await;
    set(&store, "key1", "value1").await;

    assert_eq!(get(&store, "key1").await, Some(CacheValue::from("value1")));
    let (entries, total) = store.list(vec![]).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(entries[0].key, "key1");
}

#[tokio::test]
async fn test_set_replaces_value() {
    let store = ready_store(vec![]).await;
    set(&store, "key1", credentials()).await;
    set(&store, "key1", "plain").await;
    assert_eq!(get(&store, "key1").await, Some(CacheValue::from("plain")));
}

#[tokio::test]
async fn test_empty_and_large_values() {
    let store = encrypted_store().await;
    set(&store, "empty", "").await;
    set(&store, "large", large_string(100 * 1024)).await;

    assert_eq!(get(&store, "empty").await, Some(CacheValue::from("")));
    assert_eq!(get(&store, "large").await, Some(large_string(100 * 1024)));
}

#[tokio::test]
async fn test_delete() {
    let store = ready_store(vec![]).await;
    set(&store, "key1", "value1").await;

    store.delete(vec![DeleteOption::key("key1")]).await.unwrap();
    assert_eq!(get(&store, "key1").await, None);

    store
        .delete(vec![DeleteOption::key("non-existent-key")])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_expiration() {
    let store = ready_store(vec![]).await;
    store
        .set(vec![
            SetOption::key_value("key1", "value1"),
            SetOption::expiration(Duration::from_millis(100)),
        ])
        .await
        .unwrap();
    assert!(get(&store, "key1").await.is_some());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(get(&store, "key1").await, None);
}

#[tokio::test]
async fn test_zero_expiration_never_expires() {
    let store = ready_store(vec![]).await;
    store
        .set(vec![
            SetOption::key_value("key1", "value1"),
            SetOption::expiration(Duration::ZERO),
        ])
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(get(&store, "key1").await.is_some());
}

#[tokio::test]
async fn test_expiration_beyond_clock_range_never_expires() {
    let store = ready_store(vec![]).await;
    store
        .set(vec![
            SetOption::key_value("key1", "value1"),
            SetOption::expiration(Duration::MAX),
        ])
        .await
        .unwrap();
    assert_eq!(get(&store, "key1").await, Some(CacheValue::from("value1")));
}

#[tokio::test]
async fn test_reset_and_total() {
    let store = ready_store(vec![]).await;
    set(&store, "key1", "value1").await;
    set(&store, "key2", "value2").await;
    assert_eq!(store.total().await, 2);

    store.reset().await.unwrap();
    assert_eq!(store.total().await, 0);
    assert_eq!(get(&store, "key1").await, None);
}

// ============================================================================
// TENANT LISTING
// ============================================================================

#[tokio::test]
async fn test_list_by_tenant() {
    let store = ready_store(vec![]).await;
    set(&store, "tenant1-key1", "value1").await;
    set(&store, "tenant1-key2", "value2").await;
    set(&store, "tenant2-key1", "value3").await;
    set(&store, "tenant2-key2", "value4").await;
    set(&store, "key-without-tenant", "value5").await;

    let (entries, total) = store
        .list(vec![ListOption::tenant_uuid("tenant1")])
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert!(entries.iter().all(|e| e.key.starts_with("tenant1-")));

    let (entries, total) = store.list(vec![]).await.unwrap();
    assert_eq!(total, 5);
    assert_eq!(entries.len(), 5);
}

#[tokio::test]
async fn test_list_tenant_is_not_a_bare_prefix() {
    let store = ready_store(vec![]).await;
    set(&store, "tenant1-key", "a").await;
    set(&store, "tenant10-key", "b").await;

    let (entries, total) = store
        .list(vec![ListOption::tenant_uuid("tenant1")])
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(entries[0].key, "tenant1-key");
}

#[tokio::test]
async fn test_list_with_uuid_tenants() {
    let store = ready_store(vec![]).await;
    let tenant = uuid::Uuid::now_v7();
    let other = uuid::Uuid::now_v7();
    set(&store, &scoped_key(tenant, "a"), 1).await;
    set(&store, &scoped_key(tenant, "b"), 2).await;
    set(&store, &scoped_key(other, "a"), 3).await;

    let (_, total) = store
        .list(vec![ListOption::tenant_uuid(tenant)])
        .await
        .unwrap();
    assert_eq!(total, 2);
}

// ============================================================================
// ENCRYPTION
// ============================================================================

#[tokio::test]
async fn test_encrypted_roundtrip_hides_plaintext() {
    let store = encrypted_store().await;
    set(&store, "secret-key", credentials()).await;

    let raw = store
        .backend()
        .unwrap()
        .get("secret-key")
        .await
        .unwrap()
        .unwrap();
    assert!(!String::from_utf8_lossy(&raw).contains("super_secret"));

    let value = get(&store, "secret-key").await.unwrap();
    assert_eq!(
        value.get("username").and_then(|v| v.as_str()),
        Some("john_doe")
    );
    assert_eq!(value, credentials());
}

#[tokio::test]
async fn test_encrypted_list_by_tenant() {
    let store = encrypted_store().await;
    set(&store, "tenant1-secret1", "encrypted_value1").await;
    set(&store, "tenant1-secret2", "encrypted_value2").await;
    set(&store, "tenant2-secret1", "encrypted_value3").await;

    let (entries, total) = store
        .list(vec![ListOption::tenant_uuid("tenant1")])
        .await
        .unwrap();
    assert_eq!(total, 2);
    for entry in entries {
        assert!(entry
            .value
            .as_str()
            .is_some_and(|v| v.starts_with("encrypted_value")));
    }
}

#[tokio::test]
async fn test_tampered_value_fails_get_and_is_skipped_by_list() {
    let store = encrypted_store().await;
    set(&store, "valid1", "value1").await;
    set(&store, "valid2", "value2").await;
    store
        .backend()
        .unwrap()
        .set("tampered", b"invalid encrypted data".to_vec(), None)
        .await
        .unwrap();

    let result = store.get(vec![GetOption::key("tampered")]).await;
    assert_envelope_error(&result);
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("failed to decrypt value"));

    let (entries, total) = store.list(vec![]).await.unwrap();
    assert_eq!(total, 2);
    assert!(entries.iter().all(|e| e.key.starts_with("valid")));
}

#[tokio::test]
async fn test_encrypt_failure_fails_set() {
    let store = ready_store(vec![StoreOption::crypto_service(Arc::new(
        FailingCryptoService,
    ))])
    .await;

    assert_envelope_error(&store.set(vec![SetOption::key_value("key1", "value1")]).await);
    let backend = store.backend().unwrap();
    assert_eq!(backend.get("key1").await.unwrap(), None);
    assert_eq!(store.total().await, 0);
}

#[tokio::test]
async fn test_non_finite_number_fails_set() {
    let store = ready_store(vec![]).await;
    assert_envelope_error(
        &store
            .set(vec![SetOption::key_value("key1", CacheValue::Number(f64::NAN))])
            .await,
    );
    assert_eq!(get(&store, "key1").await, None);
}

#[tokio::test]
async fn test_empty_ciphertext_fails_get() {
    let store = encrypted_store().await;
    store
        .backend()
        .unwrap()
        .set("empty", Vec::new(), None)
        .await
        .unwrap();
    assert_envelope_error(&store.get(vec![GetOption::key("empty")]).await);
}

#[tokio::test]
async fn test_crypto_service_is_consulted_only_when_configured() {
    let service = Arc::new(MockCryptoService::new());
    let store = ready_store(vec![StoreOption::crypto_service(service.clone())]).await;

    set(&store, "key1", "value1").await;
    assert_eq!(service.encrypt_calls(), 1);
    let raw = store.backend().unwrap().get("key1").await.unwrap().unwrap();
    assert!(raw.starts_with(MOCK_MARKER));

    assert_eq!(get(&store, "key1").await, Some(CacheValue::from("value1")));
    assert_eq!(service.decrypt_calls(), 1);

    let plain = ready_store(vec![]).await;
    set(&plain, "key1", "value1").await;
    let raw = plain.backend().unwrap().get("key1").await.unwrap().unwrap();
    assert_eq!(raw, b"\"value1\"");
}

#[tokio::test]
async fn test_crypto_service_supplied_at_init() {
    let mut store = KvCacheStore::new(MemoryConnector::new(), config(), vec![]).unwrap();
    assert!(!store.options().encryption_enabled());

    let service: Arc<dyn CryptoService> = Arc::new(aes_service());
    store
        .init(vec![StoreOption::crypto_service(service)])
        .await
        .unwrap();
    assert!(store.options().encryption_enabled());

    set(&store, "key1", "value1").await;
    let raw = store.backend().unwrap().get("key1").await.unwrap().unwrap();
    assert_ne!(raw, b"\"value1\"");
}

// ============================================================================
// OPTIONS AND LIFECYCLE
// ============================================================================

#[tokio::test]
async fn test_rejecting_option_fails_construction() {
    let result = KvCacheStore::new(
        MemoryConnector::new(),
        config(),
        vec![StoreOption::crypto_service(Arc::new(UnavailableCryptoService))],
    );
    assert!(result.is_err());

    let result = KvCacheStore::new(
        MemoryConnector::new(),
        config(),
        vec![StoreOption::custom(|_| {
            Err(ConfigError::invalid("custom", "invalid option"))
        })],
    );
    assert_config_error(&result);
}

#[tokio::test]
async fn test_attributes_are_exposed() {
    let store = ready_store(vec![
        StoreOption::attribute("key1", "value"),
        StoreOption::attribute("key2", 2),
    ])
    .await;
    let attributes = store.options().attributes();
    assert_eq!(attributes.get("key1").and_then(|v| v.as_str()), Some("value"));
    assert_eq!(attributes.get("key2").and_then(|v| v.as_f64()), Some(2.0));
}

#[tokio::test]
async fn test_invalid_call_options() {
    let store = ready_store(vec![]).await;
    assert_config_error(&store.get(vec![]).await);
    assert_config_error(&store.get(vec![GetOption::key("")]).await);
    assert_config_error(&store.set(vec![SetOption::expiration(Duration::from_secs(1))]).await);
    assert_config_error(&store.delete(vec![]).await);
}

#[tokio::test]
async fn test_lifecycle_errors() {
    let mut store = KvCacheStore::new(MemoryConnector::new(), config(), vec![]).unwrap();
    assert_lifecycle_error(&store.get(vec![GetOption::key("k")]).await);
    assert_lifecycle_error(&store.set(vec![SetOption::key_value("k", "v")]).await);
    assert_lifecycle_error(&store.list(vec![]).await);
    assert_lifecycle_error(&store.reset().await);

    store.init(vec![]).await.unwrap();
    store.close().await.unwrap();
    store.close().await.unwrap();

    assert_lifecycle_error(&store.get(vec![GetOption::key("k")]).await);
    assert_lifecycle_error(&store.list(vec![]).await);
    store.delete(vec![DeleteOption::key("k")]).await.unwrap();
}

#[tokio::test]
async fn test_info_and_display_hide_password() {
    let store = ready_store(vec![]).await;
    set(&store, "key1", "value1").await;

    let info = store.info().await;
    assert_eq!(info.store_type, "memory");
    assert_eq!(info.num_items, 1);
    assert_eq!(info.connection_info, "memory://:***@localhost:6379/2");
    assert!(!info.connection_info.contains(PASSWORD));
    assert!(!store.to_string().contains(PASSWORD));
    assert_eq!(store.to_string(), info.connection_info);
}

#[tokio::test]
async fn test_stores_share_a_namespace_through_the_connector() {
    let connector = MemoryConnector::new();
    let mut writer = KvCacheStore::new(connector.clone(), config(), vec![]).unwrap();
    let mut reader = KvCacheStore::new(connector, config(), vec![]).unwrap();
    writer.init(vec![]).await.unwrap();
    reader.init(vec![]).await.unwrap();

    set(&writer, "shared", "value").await;
    assert_eq!(get(&reader, "shared").await, Some(CacheValue::from("value")));
}

#[tokio::test]
async fn test_store_as_trait_object() {
    let mut store: Box<dyn CacheStore> = Box::new(
        KvCacheStore::new(MemoryConnector::new(), config(), vec![]).unwrap(),
    );
    store.init(vec![]).await.unwrap();
    store
        .set(vec![SetOption::key_value("key1", "value1")])
        .await
        .unwrap();
    assert_eq!(store.total().await, 1);
    store.close().await.unwrap();
}

#[tokio::test]
async fn test_timeout_wraps_operations() {
    let store = ready_store(vec![]).await;
    let result = tokio::time::timeout(
        Duration::from_secs(1),
        store.set(vec![SetOption::key_value("key1", "value1")]),
    )
    .await;
    assert!(matches!(result, Ok(Ok(()))));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_encrypted_set_get_roundtrip(value in arb_cache_value()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let read = runtime.block_on(async {
            let store = encrypted_store().await;
            set(&store, "key", value.clone()).await;
            get(&store, "key").await
        });
        prop_assert_eq!(read, Some(value));
    }

    #[test]
    fn prop_list_returns_exactly_the_tenant_keys(
        tenants in proptest::collection::btree_map(
            arb_tenant(),
            proptest::collection::btree_set(arb_key_suffix(), 1..5),
            1..4,
        ),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let store = ready_store(vec![]).await;
            for (tenant, suffixes) in &tenants {
                for suffix in suffixes {
                    set(&store, &scoped_key(tenant, suffix), suffix.as_str()).await;
                }
            }
            set(&store, "unscoped", "value").await;

            for (tenant, suffixes) in &tenants {
                let (entries, total) = store
                    .list(vec![ListOption::tenant_uuid(tenant)])
                    .await
                    .unwrap();
                let mut keys: Vec<String> = entries.into_iter().map(|e| e.key).collect();
                keys.sort();
                let expected: Vec<String> =
                    suffixes.iter().map(|s| scoped_key(tenant, s)).collect();
                assert_eq!(total, suffixes.len() as u64);
                assert_eq!(keys, expected);
            }
        });
    }
}
