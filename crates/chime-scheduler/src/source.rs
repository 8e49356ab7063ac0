//! The notification source boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::NotificationCandidate;

/// The notification source could not be reached.
#[derive(Debug, Error)]
#[error("notification source unavailable: {0}")]
pub struct SourceUnavailable(pub String);

/// External provider of pending notifications for a time window.
///
/// Results may contain duplicate ids and arrive unsorted; the schedule
/// builder deduplicates and orders them.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    /// Query candidates whose intended send time falls in `[start, end)`.
    async fn query_candidates(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NotificationCandidate>, SourceUnavailable>;
}
