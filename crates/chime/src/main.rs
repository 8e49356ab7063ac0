//! Chime: fleet-coordinated notification scheduler.
//!
//! Main binary with subcommands:
//! - `daemon`: trigger loop (immediate cycle, then once per hour)
//! - `run-once`: single scheduling cycle, then exit

use clap::{Parser, Subcommand, ValueEnum};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chime_scheduler::Granularity;

mod daemon;
mod dispatch;
mod source;

#[derive(Parser)]
#[command(name = "chime")]
#[command(about = "Fleet-coordinated notification scheduler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Bucketing strategy for the window schedule.
#[derive(Clone, Copy, ValueEnum)]
enum BucketGranularity {
    /// One bucket per minute of the hour.
    Minute,
    /// One bucket for the whole window.
    Window,
}

impl From<BucketGranularity> for Granularity {
    fn from(value: BucketGranularity) -> Self {
        match value {
            BucketGranularity::Minute => Granularity::Minute,
            BucketGranularity::Window => Granularity::Window,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduling daemon (immediate cycle, then hourly trigger)
    Daemon {
        /// Coordination store URL
        #[arg(long, env = "CHIME_STORE_URL")]
        store_url: String,

        /// Notification source URL
        #[arg(long, env = "CHIME_SOURCE_URL")]
        source_url: String,

        /// Webhook that receives dispatched notification id batches
        #[arg(long, env = "CHIME_WEBHOOK_URL")]
        webhook_url: String,

        /// Leader lease key in the coordination store
        #[arg(long, env = "CHIME_LOCK_NAME", default_value = "chime:hourly:lease")]
        lock_name: String,

        /// Key prefix for schedule buckets
        #[arg(long, env = "CHIME_BUCKET_PREFIX", default_value = "chime:hourly:bucket")]
        bucket_prefix: String,

        /// Minutes of lookahead before a notification's send time
        #[arg(long, default_value = "10")]
        lead_offset_minutes: u32,

        /// Seconds to sleep when no bucket is pending
        #[arg(long, default_value = "600")]
        idle_delay_secs: u64,

        /// Bucketing strategy
        #[arg(long, value_enum, default_value_t = BucketGranularity::Minute)]
        granularity: BucketGranularity,
    },

    /// Run a single scheduling cycle and exit
    RunOnce {
        /// Coordination store URL
        #[arg(long, env = "CHIME_STORE_URL")]
        store_url: String,

        /// Notification source URL
        #[arg(long, env = "CHIME_SOURCE_URL")]
        source_url: String,

        /// Webhook that receives dispatched notification id batches
        #[arg(long, env = "CHIME_WEBHOOK_URL")]
        webhook_url: String,

        /// Leader lease key in the coordination store
        #[arg(long, env = "CHIME_LOCK_NAME", default_value = "chime:hourly:lease")]
        lock_name: String,

        /// Key prefix for schedule buckets
        #[arg(long, env = "CHIME_BUCKET_PREFIX", default_value = "chime:hourly:bucket")]
        bucket_prefix: String,

        /// Minutes of lookahead before a notification's send time
        #[arg(long, default_value = "10")]
        lead_offset_minutes: u32,

        /// Seconds to sleep when no bucket is pending
        #[arg(long, default_value = "600")]
        idle_delay_secs: u64,

        /// Bucketing strategy
        #[arg(long, value_enum, default_value_t = BucketGranularity::Minute)]
        granularity: BucketGranularity,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "chime=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon {
            store_url,
            source_url,
            webhook_url,
            lock_name,
            bucket_prefix,
            lead_offset_minutes,
            idle_delay_secs,
            granularity,
        } => {
            daemon::run(daemon::DaemonConfig {
                store_url,
                source_url,
                webhook_url,
                lock_name,
                bucket_prefix,
                lead_offset_minutes,
                idle_delay_secs,
                granularity: granularity.into(),
            })
            .await
        }

        Commands::RunOnce {
            store_url,
            source_url,
            webhook_url,
            lock_name,
            bucket_prefix,
            lead_offset_minutes,
            idle_delay_secs,
            granularity,
        } => {
            daemon::run_once(daemon::DaemonConfig {
                store_url,
                source_url,
                webhook_url,
                lock_name,
                bucket_prefix,
                lead_offset_minutes,
                idle_delay_secs,
                granularity: granularity.into(),
            })
            .await
        }
    }
}
