//! Daemon command for running Chime's trigger loop.
//!
//! The daemon is the external trigger the scheduling core expects: one
//! cycle immediately at startup, then one at every top-of-hour. A
//! trigger that lands while a previous cycle's chain is still walking
//! its window only re-confirms leadership; it never restarts the chain.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use miette::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use chime_scheduler::{CycleConfig, Granularity, HourlyCycle, next_hour_boundary};
use chime_store::{CoordinationStore, HttpStore};

use crate::dispatch::WebhookDispatcher;
use crate::source::HttpNotificationSource;

/// Configuration for the daemon.
pub struct DaemonConfig {
    pub store_url: String,
    pub source_url: String,
    pub webhook_url: String,
    pub lock_name: String,
    pub bucket_prefix: String,
    pub lead_offset_minutes: u32,
    pub idle_delay_secs: u64,
    pub granularity: Granularity,
}

fn build_cycle(config: &DaemonConfig) -> Arc<HourlyCycle> {
    let store: Arc<dyn CoordinationStore> = Arc::new(HttpStore::new(&config.store_url));
    let source = Arc::new(HttpNotificationSource::new(&config.source_url));
    let dispatcher = Arc::new(WebhookDispatcher::new(&config.webhook_url));

    let cycle_config = CycleConfig {
        lock_name: config.lock_name.clone(),
        bucket_prefix: config.bucket_prefix.clone(),
        lead_offset: chrono::Duration::minutes(i64::from(config.lead_offset_minutes)),
        idle_delay: Duration::from_secs(config.idle_delay_secs),
        granularity: config.granularity,
        // holder_id: a fresh uuid per process
        ..CycleConfig::default()
    };

    Arc::new(HourlyCycle::new(store, source, dispatcher, cycle_config))
}

/// Run a single scheduling cycle and exit.
pub async fn run_once(config: DaemonConfig) -> Result<()> {
    let cycle = build_cycle(&config);
    info!(holder = cycle.holder_id(), "running one cycle");

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let outcome = cycle
        .run(shutdown_rx)
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    info!(?outcome, "cycle complete");
    Ok(())
}

/// Run the trigger loop until interrupted.
pub async fn run(config: DaemonConfig) -> Result<()> {
    let cycle = build_cycle(&config);
    info!(holder = cycle.holder_id(), "daemon starting");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Translate ctrl-c into the shutdown channel
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
        });
    }

    let mut shutdown_watch = shutdown_rx.clone();
    let mut cycle_task: Option<JoinHandle<()>> = None;

    loop {
        if *shutdown_watch.borrow() {
            break;
        }

        let chain_live = cycle_task
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());

        if chain_live {
            // Idempotent trigger: the previous chain still owns this
            // window, so only re-confirm (and renew) the lease.
            match cycle.confirm_leadership().await {
                Ok(true) => info!("chain still active, leadership confirmed"),
                Ok(false) => warn!("chain still active but lease held elsewhere"),
                Err(e) => warn!(error = %e, "leadership confirmation failed"),
            }
        } else {
            let cycle = Arc::clone(&cycle);
            let shutdown_rx = shutdown_rx.clone();
            cycle_task = Some(tokio::spawn(async move {
                match cycle.run(shutdown_rx).await {
                    Ok(outcome) => info!(?outcome, "cycle finished"),
                    Err(e) => error!(error = %e, "cycle failed, waiting for next trigger"),
                }
            }));
        }

        // Sleep to the next top-of-hour trigger.
        let delay = until_next_hour();
        tokio::select! {
            biased;

            _ = shutdown_watch.changed() => {
                if *shutdown_watch.borrow() {
                    break;
                }
            }

            _ = tokio::time::sleep(delay) => {}
        }
    }

    if let Some(handle) = cycle_task {
        let _ = handle.await;
    }

    info!("daemon stopped");
    Ok(())
}

/// Wall-clock delay to the next top-of-hour.
fn until_next_hour() -> Duration {
    let now = Utc::now();
    let millis = (next_hour_boundary(now) - now).num_milliseconds().max(0) as u64;
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_trigger_is_at_most_an_hour_away() {
        let delay = until_next_hour();
        assert!(delay <= Duration::from_secs(3600));
        assert!(delay > Duration::ZERO);
    }
}
