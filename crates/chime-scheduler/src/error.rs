//! Error types for the scheduling core.

use thiserror::Error;

use crate::SourceUnavailable;

/// Errors that can abort a scheduling cycle.
///
/// Nothing here is process-fatal: every failure degrades to "do nothing
/// this cycle" and the next hourly trigger retries. Dispatch failures are
/// logged inside the timer chain and never surface through this type.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Coordination store read/write fault. Fail closed: abstain from
    /// leadership and bucket mutation.
    #[error("coordination store error: {0}")]
    Store(#[from] chime_store::StoreError),

    /// The notification source could not be reached. The window's build
    /// is abandoned with no new buckets written.
    #[error(transparent)]
    Source(#[from] SourceUnavailable),
}
