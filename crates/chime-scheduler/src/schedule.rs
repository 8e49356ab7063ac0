//! Schedule building.
//!
//! Converts the window's candidates into sparse minute-keyed buckets in
//! the coordination store and returns the ascending list of non-empty
//! minutes the timer chain will walk.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use tracing::{debug, info};

use chime_store::{CoordinationStore, StoreError};

use crate::types::NotificationCandidate;
use crate::window::Window;

/// How send times map onto buckets.
///
/// `Minute` spreads the window over per-minute buckets; `Window` collapses
/// everything into a single bucket fired at the window's first minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Granularity {
    #[default]
    Minute,
    Window,
}

/// Builds and persists the bucketed schedule for one window.
pub struct ScheduleBuilder {
    store: Arc<dyn CoordinationStore>,
    key_prefix: String,
    lead_offset: Duration,
    granularity: Granularity,
}

impl ScheduleBuilder {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        key_prefix: impl Into<String>,
        lead_offset: Duration,
        granularity: Granularity,
    ) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into(),
            lead_offset,
            granularity,
        }
    }

    /// Store key for a bucket minute.
    pub fn bucket_key(key_prefix: &str, minute: u32) -> String {
        format!("{key_prefix}:{minute}")
    }

    /// Bucket the candidates and persist each non-empty bucket with a TTL
    /// equal to the remaining window time.
    ///
    /// Candidates are deduplicated by id (first occurrence wins) and
    /// sorted ascending by intended send time before grouping; grouping is
    /// stable, so two runs over the same set produce identical buckets.
    /// Returns the ascending list of minutes that received at least one id.
    pub async fn build(
        &self,
        candidates: Vec<NotificationCandidate>,
        window: &Window,
        now: DateTime<Utc>,
    ) -> Result<Vec<u32>, StoreError> {
        let candidates = dedup_and_sort(candidates);

        let mut buckets: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for candidate in candidates {
            let minute = match self.granularity {
                Granularity::Minute => (candidate.intended_send_time - self.lead_offset).minute(),
                Granularity::Window => window.start.minute(),
            };
            buckets.entry(minute).or_default().push(candidate.id);
        }

        if buckets.is_empty() {
            info!("no candidates bucketed this window");
            return Ok(Vec::new());
        }

        let ttl = window.remaining_ttl(now);
        for (minute, ids) in &buckets {
            let key = Self::bucket_key(&self.key_prefix, *minute);
            self.store.add_to_set(&key, ids, ttl).await?;
            debug!(minute, count = ids.len(), "bucket written");
        }

        let minutes: Vec<u32> = buckets.keys().copied().collect();
        info!(
            buckets = minutes.len(),
            first = minutes.first(),
            last = minutes.last(),
            "schedule built"
        );
        Ok(minutes)
    }
}

/// Deduplicate by id keeping the first occurrence, then sort ascending by
/// intended send time. The sort is stable, so equal send times keep their
/// input order.
fn dedup_and_sort(candidates: Vec<NotificationCandidate>) -> Vec<NotificationCandidate> {
    let mut seen = HashSet::new();
    let mut unique: Vec<NotificationCandidate> = candidates
        .into_iter()
        .filter(|c| seen.insert(c.id.clone()))
        .collect();
    unique.sort_by_key(|c| c.intended_send_time);
    unique
}
