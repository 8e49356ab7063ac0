//! Scheduling types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A notification pending delivery, as reported by the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationCandidate {
    /// Unique notification identifier.
    pub id: String,
    /// When the notification should reach the recipient.
    pub intended_send_time: DateTime<Utc>,
}

impl NotificationCandidate {
    pub fn new(id: impl Into<String>, intended_send_time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            intended_send_time,
        }
    }
}

/// The lease record stored under the lock key.
///
/// Validity comes from the store's TTL; `acquired_at` is informational
/// and never trusted for expiry decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseRecord {
    /// Opaque identifier of the process holding the lease.
    pub holder: String,
    /// When the lease was first acquired.
    pub acquired_at: DateTime<Utc>,
}

impl LeaseRecord {
    pub fn new(holder: impl Into<String>) -> Self {
        Self {
            holder: holder.into(),
            acquired_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_roundtrip() {
        let candidate = NotificationCandidate::new("notif-1", Utc::now());
        let json = serde_json::to_string(&candidate).unwrap();
        let decoded: NotificationCandidate = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, candidate);
    }

    #[test]
    fn lease_record_roundtrip() {
        let record = LeaseRecord::new("holder-a");
        let json = serde_json::to_string(&record).unwrap();
        let decoded: LeaseRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.holder, "holder-a");
        assert_eq!(decoded.acquired_at, record.acquired_at);
    }
}
