//! The coordination store contract.

use std::time::Duration;

use async_trait::async_trait;

use crate::StoreError;

/// Shared key/value store used for leader leases and schedule buckets.
///
/// Validity of a key is determined by the store's TTL, not by a timestamp
/// callers trust blindly. All writes are idempotent: re-writing the same
/// lease or bucket membership is safe.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Read a value. Returns `None` if the key is absent or expired.
    async fn get_value(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value with a TTL, overwriting any existing value.
    async fn set_value(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Atomically write a value with a TTL only if the key is absent.
    ///
    /// Returns `true` if this call created the key. Exactly one of any
    /// number of concurrent callers observes `true` for an absent key.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Add members to a set, creating it with the given TTL if absent.
    async fn add_to_set(
        &self,
        key: &str,
        members: &[String],
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Read all members of a set. Returns an empty vec if the key is
    /// absent or expired.
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;
}
