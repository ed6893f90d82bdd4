//! Tenant-scoped key convention.
//!
//! Tenants share one keyspace. A key belongs to a tenant when it has the
//! form `"<tenant>-<rest>"`. The convention is not enforced on write; it
//! only drives filtered listing.

use std::fmt::Display;

use crate::backend::KeyPattern;

/// Separator between the tenant id and the rest of the key.
pub const SEPARATOR: char = '-';

/// Build a key scoped to `tenant`.
pub fn scoped_key(tenant: impl Display, rest: &str) -> String {
    format!("{}{}{}", tenant, SEPARATOR, rest)
}

/// The prefix shared by every key of `tenant`.
pub fn tenant_prefix(tenant: impl Display) -> String {
    format!("{}{}", tenant, SEPARATOR)
}

/// Whether `key` is scoped to `tenant`.
pub fn belongs_to(key: &str, tenant: &str) -> bool {
    key.strip_prefix(tenant)
        .is_some_and(|rest| rest.starts_with(SEPARATOR))
}

/// Enumeration pattern for a listing filtered by `tenant`.
pub fn key_pattern(tenant: Option<&str>) -> KeyPattern {
    match tenant {
        Some(tenant) => KeyPattern::Prefix(tenant_prefix(tenant)),
        None => KeyPattern::All,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_scoped_key_format() {
        assert_eq!(scoped_key("tenant1", "key1"), "tenant1-key1");
        assert_eq!(tenant_prefix("tenant1"), "tenant1-");
    }

    #[test]
    fn test_belongs_to_requires_separator() {
        assert!(belongs_to("tenant1-key1", "tenant1"));
        assert!(!belongs_to("tenant10-key1", "tenant1"));
        assert!(!belongs_to("tenant1", "tenant1"));
        assert!(!belongs_to("key-without-tenant", "tenant1"));
    }

    #[test]
    fn test_key_pattern() {
        assert_eq!(key_pattern(None), KeyPattern::All);
        assert_eq!(
            key_pattern(Some("tenant1")),
            KeyPattern::Prefix("tenant1-".to_string())
        );
    }

    #[test]
    fn test_uuid_tenants() {
        let tenant = uuid::Uuid::now_v7();
        let key = scoped_key(tenant, "session");
        assert!(belongs_to(&key, &tenant.to_string()));
        assert!(!belongs_to(&key, &uuid::Uuid::now_v7().to_string()));
    }

    proptest! {
        #[test]
        fn prop_scoped_keys_belong_to_their_tenant(
            tenant in "[a-z0-9]{1,16}",
            rest in "[a-zA-Z0-9:_-]{0,32}",
        ) {
            let key = scoped_key(&tenant, &rest);
            prop_assert!(belongs_to(&key, &tenant));
            prop_assert!(key_pattern(Some(&tenant)).matches(&key));
        }

        #[test]
        fn prop_tenant_is_not_a_prefix_of_its_extension(
            tenant in "[a-z0-9]{1,16}",
            suffix in "[a-z0-9]{1,4}",
            rest in "[a-z0-9]{0,8}",
        ) {
            let other = format!("{}{}", tenant, suffix);
            prop_assert!(!belongs_to(&scoped_key(&other, &rest), &tenant));
        }
    }
}
