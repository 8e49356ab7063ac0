//! The self-rescheduling timer chain.
//!
//! One chain walks one window's schedule: each activation computes a
//! single sleep, fires any due bucket, and re-enters until the schedule
//! is exhausted, the window closes, leadership is lost, or shutdown is
//! requested. Never a busy poll; never two concurrent activations.

use std::sync::Arc;

use chrono::{Timelike, Utc};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use chime_store::CoordinationStore;

use crate::lease::LeaseGuard;
use crate::schedule::ScheduleBuilder;
use crate::{Dispatcher, SchedulerError, Window};

/// States of the timer chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// Created, not yet activated.
    Idle,
    /// Sleeping until the next activation.
    Waiting,
    /// Reading a due bucket and dispatching it.
    Firing,
    /// Terminated; a fresh chain owns the next window.
    Done,
}

/// Why a chain terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
    /// Every scheduled bucket was consumed.
    Exhausted,
    /// The window's deadline passed with buckets remaining or none scheduled.
    WindowClosed,
    /// Another process holds the lease now.
    LeadershipLost,
    /// Shutdown was requested.
    ShutdownRequested,
}

/// What one activation decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Activation {
    /// Fire the bucket at `minute`, then sleep `next_delay`.
    Fire {
        minute: u32,
        next_delay: std::time::Duration,
    },
    /// Nothing due yet; sleep `delay` and re-enter.
    Wait { delay: std::time::Duration },
    /// All buckets consumed.
    Done,
}

/// Walks one window's bucket schedule, firing each bucket at its minute.
pub struct TimerChain {
    store: Arc<dyn CoordinationStore>,
    dispatcher: Arc<dyn Dispatcher>,
    lease: LeaseGuard,
    key_prefix: String,
    slots: Vec<u32>,
    position: usize,
    window: Window,
    idle_delay: std::time::Duration,
    state: ChainState,
}

impl TimerChain {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        dispatcher: Arc<dyn Dispatcher>,
        lease: LeaseGuard,
        key_prefix: impl Into<String>,
        slots: Vec<u32>,
        window: Window,
        idle_delay: std::time::Duration,
    ) -> Self {
        Self {
            store,
            dispatcher,
            lease,
            key_prefix: key_prefix.into(),
            slots,
            position: 0,
            window,
            idle_delay,
            state: ChainState::Idle,
        }
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Run the chain to termination.
    ///
    /// Leadership is re-validated before every firing/waiting decision,
    /// not just once at start; a lost lease stops the chain mid-window.
    /// Store faults propagate (fail closed) and the next hourly trigger
    /// retries the window.
    pub async fn run(
        mut self,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<ChainOutcome, SchedulerError> {
        info!(
            slots = self.slots.len(),
            deadline = %self.window.deadline,
            "timer chain started"
        );

        loop {
            if *shutdown_rx.borrow() {
                self.state = ChainState::Done;
                return Ok(ChainOutcome::ShutdownRequested);
            }

            let now = Utc::now();

            if !self.lease.try_acquire_or_confirm(now).await? {
                self.state = ChainState::Done;
                info!("lease lost, stopping timer chain");
                return Ok(ChainOutcome::LeadershipLost);
            }

            if self.window.is_closed(now) {
                self.state = ChainState::Done;
                info!(position = self.position, "window closed, stopping timer chain");
                return Ok(ChainOutcome::WindowClosed);
            }

            match decide(&self.slots, self.position, now.minute(), self.idle_delay) {
                Activation::Done => {
                    self.state = ChainState::Done;
                    info!("schedule exhausted");
                    return Ok(ChainOutcome::Exhausted);
                }
                Activation::Fire { minute, next_delay } => {
                    self.state = ChainState::Firing;
                    self.fire_bucket(minute).await?;
                    self.position += 1;

                    self.state = ChainState::Waiting;
                    if !wait(next_delay, &mut shutdown_rx).await {
                        self.state = ChainState::Done;
                        return Ok(ChainOutcome::ShutdownRequested);
                    }
                }
                Activation::Wait { delay } => {
                    self.state = ChainState::Waiting;
                    if !wait(delay, &mut shutdown_rx).await {
                        self.state = ChainState::Done;
                        return Ok(ChainOutcome::ShutdownRequested);
                    }
                }
            }
        }
    }

    /// Read a due bucket and hand its members to the dispatcher.
    ///
    /// Dispatch failures are reported and the chain continues; a store
    /// fault on the bucket read propagates and terminates the chain.
    async fn fire_bucket(&self, minute: u32) -> Result<(), SchedulerError> {
        let key = ScheduleBuilder::bucket_key(&self.key_prefix, minute);
        let mut batch = self.store.set_members(&key).await?;

        if batch.is_empty() {
            debug!(minute, "bucket empty or expired, nothing to dispatch");
            return Ok(());
        }
        batch.sort();

        match self.dispatcher.dispatch(&batch).await {
            Ok(()) => info!(minute, count = batch.len(), "bucket dispatched"),
            Err(error) => warn!(minute, error = %error, "dispatch failed, continuing chain"),
        }

        Ok(())
    }
}

/// Decide what one activation does, given the cursor and the wall-clock
/// minute.
///
/// A slot at or before the current minute is due: missed minutes (clock
/// skew, slow processing) fire immediately rather than being skipped.
/// After a fire, the next delay runs to the next slot's minute,
/// saturating at zero so an overdue backlog drains on consecutive
/// activations in ascending order.
pub(crate) fn decide(
    slots: &[u32],
    position: usize,
    current_minute: u32,
    idle_delay: std::time::Duration,
) -> Activation {
    let Some(&slot) = slots.get(position) else {
        if slots.is_empty() {
            // Nothing to do this window; keep checking at the idle
            // interval until the window closes.
            return Activation::Wait { delay: idle_delay };
        }
        return Activation::Done;
    };

    if slot <= current_minute {
        let next_delay = match slots.get(position + 1) {
            Some(&next) => minutes_until(current_minute, next),
            None => idle_delay,
        };
        Activation::Fire {
            minute: slot,
            next_delay,
        }
    } else {
        Activation::Wait {
            delay: minutes_until(current_minute, slot),
        }
    }
}

/// Wall-clock delay from `current` to `target` minute, zero if already
/// reached.
fn minutes_until(current: u32, target: u32) -> std::time::Duration {
    std::time::Duration::from_secs(60 * u64::from(target.saturating_sub(current)))
}

/// Sleep for `delay`, returning early on shutdown. Returns `false` when
/// shutdown was requested.
async fn wait(delay: std::time::Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        biased;

        _ = shutdown_rx.changed() => !*shutdown_rx.borrow(),
        _ = sleep(delay) => true,
    }
}
