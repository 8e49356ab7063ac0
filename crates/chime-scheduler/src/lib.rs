//! Fleet-coordinated notification scheduling for Chime.
//!
//! This crate provides the coordination core that:
//! - Elects a single leader per window via a store-backed lease
//! - Fetches and buckets pending notifications into a minute-indexed schedule
//! - Walks the schedule with a self-rescheduling timer chain
//! - Tolerates partial failures of any step without crashing the process

mod chain;
mod cycle;
mod dispatch;
mod error;
mod lease;
mod schedule;
mod source;
mod types;
mod window;

pub use chain::{ChainOutcome, ChainState, TimerChain};
pub use cycle::{CycleConfig, CycleOutcome, HourlyCycle};
pub use dispatch::{DispatchError, Dispatcher};
pub use error::SchedulerError;
pub use lease::LeaseGuard;
pub use schedule::{Granularity, ScheduleBuilder};
pub use source::{NotificationSource, SourceUnavailable};
pub use types::{LeaseRecord, NotificationCandidate};
pub use window::{Window, next_hour_boundary};
