//! The hourly scheduling cycle.
//!
//! One invocation is one attempt to govern the current window: acquire
//! or confirm the lease, fetch the window's candidates, build the bucket
//! schedule, and walk it with a timer chain. The external trigger calls
//! this once at startup and once per hour; every failure degrades to
//! "do nothing this cycle" and the next trigger retries.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use chime_store::CoordinationStore;

use crate::chain::{ChainOutcome, TimerChain};
use crate::lease::LeaseGuard;
use crate::schedule::{Granularity, ScheduleBuilder};
use crate::{Dispatcher, NotificationSource, SchedulerError, Window};

/// Configuration for a scheduling cycle.
#[derive(Debug, Clone)]
pub struct CycleConfig {
    /// Store key of the leader lease.
    pub lock_name: String,
    /// Key prefix for bucket sets.
    pub bucket_prefix: String,
    /// This process's lease identity.
    pub holder_id: String,
    /// Lookahead before a notification's send time at which processing
    /// must begin.
    pub lead_offset: chrono::Duration,
    /// Sleep used when no bucket is pending.
    pub idle_delay: std::time::Duration,
    /// Bucketing strategy.
    pub granularity: Granularity,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            lock_name: "chime:hourly:lease".to_string(),
            bucket_prefix: "chime:hourly:bucket".to_string(),
            holder_id: Uuid::new_v4().to_string(),
            lead_offset: chrono::Duration::minutes(10),
            idle_delay: std::time::Duration::from_secs(600),
            granularity: Granularity::Minute,
        }
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another process governs this window.
    NotLeader,
    /// This process led the window; the chain terminated as given.
    Led(ChainOutcome),
}

/// The per-window scheduling pipeline: lease, fetch, build, walk.
pub struct HourlyCycle {
    store: Arc<dyn CoordinationStore>,
    source: Arc<dyn NotificationSource>,
    dispatcher: Arc<dyn Dispatcher>,
    lease: LeaseGuard,
    config: CycleConfig,
}

impl HourlyCycle {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        source: Arc<dyn NotificationSource>,
        dispatcher: Arc<dyn Dispatcher>,
        config: CycleConfig,
    ) -> Self {
        let lease = LeaseGuard::new(Arc::clone(&store), &config.lock_name, &config.holder_id);
        Self {
            store,
            source,
            dispatcher,
            lease,
            config,
        }
    }

    pub fn holder_id(&self) -> &str {
        &self.config.holder_id
    }

    /// Re-confirm (and renew) leadership without starting a new chain.
    ///
    /// The trigger uses this when a previous cycle's chain is still
    /// walking its window: the trigger is idempotent and must not
    /// restart a live chain.
    pub async fn confirm_leadership(&self) -> Result<bool, SchedulerError> {
        Ok(self.lease.try_acquire_or_confirm(Utc::now()).await?)
    }

    /// Run one full cycle to completion.
    pub async fn run(
        &self,
        shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) -> Result<CycleOutcome, SchedulerError> {
        let now = Utc::now();

        if !self.lease.try_acquire_or_confirm(now).await? {
            info!(holder = %self.config.holder_id, "not leader this window");
            return Ok(CycleOutcome::NotLeader);
        }

        let window = Window::upcoming(now, self.config.lead_offset);
        info!(
            start = %window.start,
            end = %window.end,
            deadline = %window.deadline,
            "leading window"
        );

        // SourceUnavailable aborts the build: no new buckets are written
        // and the next hourly trigger retries the whole window.
        let candidates = self
            .source
            .query_candidates(window.start, window.end)
            .await?;
        info!(count = candidates.len(), "fetched window candidates");

        let builder = ScheduleBuilder::new(
            Arc::clone(&self.store),
            &self.config.bucket_prefix,
            self.config.lead_offset,
            self.config.granularity,
        );
        let slots = builder.build(candidates, &window, now).await?;

        let chain = TimerChain::new(
            Arc::clone(&self.store),
            Arc::clone(&self.dispatcher),
            self.lease.clone(),
            &self.config.bucket_prefix,
            slots,
            window,
            self.config.idle_delay,
        );

        let outcome = chain.run(shutdown_rx).await?;
        info!(?outcome, "cycle finished");
        Ok(CycleOutcome::Led(outcome))
    }
}
