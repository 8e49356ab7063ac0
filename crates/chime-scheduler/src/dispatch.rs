//! The dispatcher boundary.

use async_trait::async_trait;
use thiserror::Error;

/// Delivery of a batch failed.
///
/// The timer chain reports these and moves on; a failed bucket never
/// aborts the chain.
#[derive(Debug, Error)]
#[error("dispatch failed: {0}")]
pub struct DispatchError(pub String);

/// External sender invoked with a batch of notification ids.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Deliver the given batch of notification ids.
    async fn dispatch(&self, batch: &[String]) -> Result<(), DispatchError>;
}
