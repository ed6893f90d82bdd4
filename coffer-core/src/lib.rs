//! Coffer Core - Data Types and Contracts
//!
//! Values, result models, option bags, connection configuration and the
//! crypto service contract shared by every Coffer crate. No I/O happens here.

mod config;
mod crypto;
mod entities;
mod error;
mod options;
mod value;

pub use config::{ConnectionConfig, DEFAULT_ADDRESS};
pub use crypto::{AesGcmCryptoService, CryptoService, AES_256_KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use entities::{CacheEntry, CacheStoreInfo};
pub use error::{
    BackendError, CodecError, CofferError, CofferResult, ConfigError, ConfigResult, CryptoError,
    EnvelopeError, StoreError,
};
pub use options::{
    apply_options, Attributes, ConfigOption, CustomStep, DeleteOption, DeleteOptions, GetOption,
    GetOptions, ListOption, ListOptions, SetOption, SetOptions, StoreOption, StoreOptions,
    DEFAULT_EXPIRATION,
};
pub use value::CacheValue;

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_scalar() -> impl Strategy<Value = CacheValue> {
        prop_oneof![
            Just(CacheValue::Null),
            any::<bool>().prop_map(CacheValue::Bool),
            (-1_000_000_000i64..1_000_000_000).prop_map(|n| CacheValue::Number(n as f64)),
            ".*".prop_map(CacheValue::String),
        ]
    }

    proptest! {
        #[test]
        fn prop_json_codec_preserves_scalars(value in arb_scalar()) {
            let bytes = value.to_json_bytes().unwrap();
            prop_assert!(!bytes.is_empty());
            prop_assert_eq!(CacheValue::from_json_bytes(&bytes).unwrap(), value);
        }

        #[test]
        fn prop_integers_read_back_as_floats(n in any::<i32>()) {
            let bytes = CacheValue::from(n).to_json_bytes().unwrap();
            prop_assert_eq!(
                CacheValue::from_json_bytes(&bytes).unwrap(),
                CacheValue::Number(n as f64)
            );
        }

        #[test]
        fn prop_descriptor_never_contains_password(password in "secret-[a-z0-9]{8,24}") {
            let config = ConnectionConfig::new("localhost:6379", password.clone(), 0);
            prop_assert!(!config.descriptor("redis").contains(&password));
        }

        #[test]
        fn prop_aes_gcm_decrypts_own_output(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let service = AesGcmCryptoService::new(&[7u8; AES_256_KEY_SIZE]).unwrap();
            let sealed = service.encrypt(&data).unwrap();
            prop_assert_eq!(sealed.len(), NONCE_SIZE + data.len() + TAG_SIZE);
            prop_assert_eq!(service.decrypt(&sealed).unwrap(), data);
        }
    }
}
