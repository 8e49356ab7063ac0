//! Error types for the coordination store.

use thiserror::Error;

/// Errors that can occur when talking to the coordination store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid response from the store.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The store rejected a write.
    #[error("write rejected: {0}")]
    WriteRejected(String),
}
