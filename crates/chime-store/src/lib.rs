//! Coordination store client for Chime.
//!
//! This crate defines the shared key/value boundary the scheduler
//! coordinates through:
//! - Atomic set-if-absent with TTL (leader leases)
//! - Plain get/set with TTL (lease renewal)
//! - Set add/members (schedule buckets)

mod error;
mod http;
mod memory;
mod store;

pub use error::StoreError;
pub use http::HttpStore;
pub use memory::MemoryStore;
pub use store::CoordinationStore;
