//! Store-backed leader lease.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use chime_store::{CoordinationStore, StoreError};

use crate::types::LeaseRecord;
use crate::window::next_hour_boundary;

/// Upper bound on a lease TTL: one full window length.
const MAX_LEASE_SECS: i64 = 3600;

/// A time-boxed exclusive right to act as the sole active scheduler.
///
/// Acquisition is an atomic set-if-absent against the coordination store;
/// the TTL runs to the next hour boundary so a late-starting leader's
/// lease never outlives the window it governs. A confirmed check renews
/// the TTL, keeping a healthy leader's lease alive for the whole window.
#[derive(Clone)]
pub struct LeaseGuard {
    store: Arc<dyn CoordinationStore>,
    lock_name: String,
    holder_id: String,
}

impl LeaseGuard {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        lock_name: impl Into<String>,
        holder_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            lock_name: lock_name.into(),
            holder_id: holder_id.into(),
        }
    }

    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    /// Acquire the lease, or confirm this process still holds it.
    ///
    /// Returns `true` when the caller is the leader for the rest of the
    /// window. Store faults propagate; callers must treat them as "not
    /// leader" (fail closed), never assuming leadership on an ambiguous
    /// response.
    pub async fn try_acquire_or_confirm(&self, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let ttl = lease_ttl(now);

        let Some(raw) = self.store.get_value(&self.lock_name).await? else {
            return self.acquire(ttl).await;
        };

        let record: LeaseRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(error) => {
                // No recorded holder we can trust; contend for the key.
                // An unreadable record still blocks set-if-absent until
                // its TTL expires.
                warn!(lock = %self.lock_name, error = %error, "unreadable lease record");
                return self.acquire(ttl).await;
            }
        };

        if record.holder == self.holder_id {
            // Still leader. Renew the TTL so the lease cannot expire
            // mid-window while this process is actively working.
            self.store.set_value(&self.lock_name, &raw, ttl).await?;
            debug!(lock = %self.lock_name, ttl_secs = ttl.as_secs(), "lease confirmed and renewed");
            return Ok(true);
        }

        debug!(
            lock = %self.lock_name,
            holder = %record.holder,
            "lease held by another process"
        );
        Ok(false)
    }

    async fn acquire(&self, ttl: std::time::Duration) -> Result<bool, StoreError> {
        let record = LeaseRecord::new(&self.holder_id);
        let raw = serde_json::to_string(&record)?;

        let acquired = self.store.set_if_absent(&self.lock_name, &raw, ttl).await?;
        if acquired {
            debug!(lock = %self.lock_name, ttl_secs = ttl.as_secs(), "lease acquired");
        }
        Ok(acquired)
    }
}

/// TTL to the next hour boundary, capped at one full window length.
fn lease_ttl(now: DateTime<Utc>) -> std::time::Duration {
    let secs = (next_hour_boundary(now) - now)
        .num_seconds()
        .clamp(1, MAX_LEASE_SECS);
    std::time::Duration::from_secs(secs as u64)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chime_store::MemoryStore;

    use super::*;

    fn guard(store: &Arc<MemoryStore>, holder: &str) -> LeaseGuard {
        let store: Arc<dyn CoordinationStore> = Arc::clone(store) as Arc<dyn CoordinationStore>;
        LeaseGuard::new(store, "test:lease", holder)
    }

    #[tokio::test]
    async fn acquires_when_absent() {
        let store = Arc::new(MemoryStore::new());
        let lease = guard(&store, "holder-a");

        assert!(lease.try_acquire_or_confirm(Utc::now()).await.unwrap());

        let raw = store.get_value("test:lease").await.unwrap().unwrap();
        let record: LeaseRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(record.holder, "holder-a");
    }

    #[tokio::test]
    async fn exactly_one_concurrent_acquisition_wins() {
        let store = Arc::new(MemoryStore::new());

        let mut handles = Vec::new();
        for i in 0..8 {
            let lease = guard(&store, &format!("holder-{i}"));
            handles.push(tokio::spawn(
                async move { lease.try_acquire_or_confirm(Utc::now()).await.unwrap() },
            ));
        }

        let mut leaders = 0;
        for handle in handles {
            if handle.await.unwrap() {
                leaders += 1;
            }
        }
        assert_eq!(leaders, 1);
    }

    #[tokio::test]
    async fn repeated_confirmation_keeps_holder() {
        let store = Arc::new(MemoryStore::new());
        let lease = guard(&store, "holder-a");

        assert!(lease.try_acquire_or_confirm(Utc::now()).await.unwrap());
        assert!(lease.try_acquire_or_confirm(Utc::now()).await.unwrap());
        assert!(lease.try_acquire_or_confirm(Utc::now()).await.unwrap());

        let raw = store.get_value("test:lease").await.unwrap().unwrap();
        let record: LeaseRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(record.holder, "holder-a");
    }

    #[tokio::test]
    async fn other_holder_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let winner = guard(&store, "holder-a");
        let loser = guard(&store, "holder-b");

        assert!(winner.try_acquire_or_confirm(Utc::now()).await.unwrap());
        assert!(!loser.try_acquire_or_confirm(Utc::now()).await.unwrap());
        // The winner keeps confirming.
        assert!(winner.try_acquire_or_confirm(Utc::now()).await.unwrap());
    }

    /// Store wrapper that counts lease renewals.
    struct CountingStore {
        inner: MemoryStore,
        renewals: AtomicUsize,
    }

    #[async_trait]
    impl CoordinationStore for CountingStore {
        async fn get_value(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get_value(key).await
        }

        async fn set_value(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
            self.renewals.fetch_add(1, Ordering::SeqCst);
            self.inner.set_value(key, value, ttl).await
        }

        async fn set_if_absent(
            &self,
            key: &str,
            value: &str,
            ttl: Duration,
        ) -> Result<bool, StoreError> {
            self.inner.set_if_absent(key, value, ttl).await
        }

        async fn add_to_set(
            &self,
            key: &str,
            members: &[String],
            ttl: Duration,
        ) -> Result<(), StoreError> {
            self.inner.add_to_set(key, members, ttl).await
        }

        async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
            self.inner.set_members(key).await
        }
    }

    #[tokio::test]
    async fn confirmation_renews_the_ttl() {
        let store = Arc::new(CountingStore {
            inner: MemoryStore::new(),
            renewals: AtomicUsize::new(0),
        });
        let counting: Arc<dyn CoordinationStore> = Arc::clone(&store) as Arc<dyn CoordinationStore>;
        let lease = LeaseGuard::new(counting, "test:lease", "holder-a");

        assert!(lease.try_acquire_or_confirm(Utc::now()).await.unwrap());
        assert_eq!(store.renewals.load(Ordering::SeqCst), 0);

        assert!(lease.try_acquire_or_confirm(Utc::now()).await.unwrap());
        assert_eq!(store.renewals.load(Ordering::SeqCst), 1);
    }

    /// Store that fails every read.
    struct FailingStore;

    #[async_trait]
    impl CoordinationStore for FailingStore {
        async fn get_value(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::InvalidResponse("store down".to_string()))
        }

        async fn set_value(
            &self,
            _key: &str,
            _value: &str,
            _ttl: Duration,
        ) -> Result<(), StoreError> {
            Err(StoreError::InvalidResponse("store down".to_string()))
        }

        async fn set_if_absent(
            &self,
            _key: &str,
            _value: &str,
            _ttl: Duration,
        ) -> Result<bool, StoreError> {
            Err(StoreError::InvalidResponse("store down".to_string()))
        }

        async fn add_to_set(
            &self,
            _key: &str,
            _members: &[String],
            _ttl: Duration,
        ) -> Result<(), StoreError> {
            Err(StoreError::InvalidResponse("store down".to_string()))
        }

        async fn set_members(&self, _key: &str) -> Result<Vec<String>, StoreError> {
            Err(StoreError::InvalidResponse("store down".to_string()))
        }
    }

    #[tokio::test]
    async fn store_fault_fails_closed() {
        let lease = LeaseGuard::new(Arc::new(FailingStore), "test:lease", "holder-a");
        assert!(lease.try_acquire_or_confirm(Utc::now()).await.is_err());
    }

    #[tokio::test]
    async fn unreadable_record_blocks_until_expiry() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_value("test:lease", "not json", Duration::from_secs(60))
            .await
            .unwrap();

        let lease = guard(&store, "holder-a");
        // Contends via set-if-absent, which the garbage key still blocks.
        assert!(!lease.try_acquire_or_confirm(Utc::now()).await.unwrap());
    }

    #[test]
    fn ttl_runs_to_the_hour_boundary() {
        use chrono::TimeZone;

        let now = Utc.with_ymd_and_hms(2024, 3, 4, 12, 40, 0).unwrap();
        assert_eq!(lease_ttl(now), Duration::from_secs(20 * 60));

        let boundary = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
        assert_eq!(lease_ttl(boundary), Duration::from_secs(3600));
    }
}
