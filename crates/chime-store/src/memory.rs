//! In-memory coordination store.
//!
//! Backs single-process deployments and tests. TTL expiry is lazy: an
//! expired entry is treated as absent on the next access and removed.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::{CoordinationStore, StoreError};

/// An entry with its expiry deadline.
#[derive(Debug, Clone)]
struct Expiring<T> {
    inner: T,
    expires_at: Instant,
}

impl<T> Expiring<T> {
    fn new(inner: T, ttl: Duration) -> Self {
        Self {
            inner,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at <= Instant::now()
    }
}

/// Thread-safe in-memory store with TTL semantics.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: DashMap<String, Expiring<String>>,
    sets: DashMap<String, Expiring<HashSet<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>, StoreError> {
        if let Some(entry) = self.values.get(key) {
            if !entry.is_expired() {
                return Ok(Some(entry.inner.clone()));
            }
        }
        // Drop the read guard before removing, DashMap deadlocks otherwise
        self.values.remove_if(key, |_, v| v.is_expired());
        Ok(None)
    }

    async fn set_value(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.values
            .insert(key.to_string(), Expiring::new(value.to_string(), ttl));
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        // The entry API holds the shard lock, making check-then-set atomic
        // per key.
        let mut created = false;
        let mut entry = self
            .values
            .entry(key.to_string())
            .or_insert_with(|| {
                created = true;
                Expiring::new(value.to_string(), ttl)
            });

        if !created && entry.is_expired() {
            *entry.value_mut() = Expiring::new(value.to_string(), ttl);
            created = true;
        }

        Ok(created)
    }

    async fn add_to_set(
        &self,
        key: &str,
        members: &[String],
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut entry = self
            .sets
            .entry(key.to_string())
            .or_insert_with(|| Expiring::new(HashSet::new(), ttl));

        if entry.is_expired() {
            *entry.value_mut() = Expiring::new(HashSet::new(), ttl);
        }

        entry.inner.extend(members.iter().cloned());
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        if let Some(entry) = self.sets.get(key) {
            if !entry.is_expired() {
                return Ok(entry.inner.iter().cloned().collect());
            }
        }
        self.sets.remove_if(key, |_, v| v.is_expired());
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn get_absent_key_returns_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get_value("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get_roundtrip() {
        let store = MemoryStore::new();
        store.set_value("k", "v", TTL).await.unwrap();
        assert_eq!(store.get_value("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn expired_value_reads_as_absent() {
        let store = MemoryStore::new();
        store
            .set_value("k", "v", Duration::from_secs(0))
            .await
            .unwrap();
        assert_eq!(store.get_value("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_if_absent_respects_existing_value() {
        let store = MemoryStore::new();
        assert!(store.set_if_absent("k", "first", TTL).await.unwrap());
        assert!(!store.set_if_absent("k", "second", TTL).await.unwrap());
        assert_eq!(
            store.get_value("k").await.unwrap(),
            Some("first".to_string())
        );
    }

    #[tokio::test]
    async fn set_if_absent_reclaims_expired_key() {
        let store = MemoryStore::new();
        store
            .set_value("k", "stale", Duration::from_secs(0))
            .await
            .unwrap();
        assert!(store.set_if_absent("k", "fresh", TTL).await.unwrap());
        assert_eq!(
            store.get_value("k").await.unwrap(),
            Some("fresh".to_string())
        );
    }

    #[tokio::test]
    async fn concurrent_set_if_absent_has_one_winner() {
        use std::sync::Arc;

        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .set_if_absent("lock", &format!("holder-{i}"), TTL)
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn add_to_set_accumulates_and_dedups() {
        let store = MemoryStore::new();
        store
            .add_to_set("s", &["a".to_string(), "b".to_string()], TTL)
            .await
            .unwrap();
        store
            .add_to_set("s", &["b".to_string(), "c".to_string()], TTL)
            .await
            .unwrap();

        let mut members = store.set_members("s").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn expired_set_reads_as_empty() {
        let store = MemoryStore::new();
        store
            .add_to_set("s", &["a".to_string()], Duration::from_secs(0))
            .await
            .unwrap();
        assert!(store.set_members("s").await.unwrap().is_empty());
    }
}
