//! HTTP coordination store client.
//!
//! Speaks to a shared key/value service over a small JSON API:
//! - `GET /v1/keys/{key}` → `{ "value": ... }` or 404
//! - `PUT /v1/keys/{key}` with `{ "value", "ttl_seconds", "if_absent" }`
//!   → 200 on write, 409 when `if_absent` is set and the key exists
//! - `POST /v1/sets/{key}/members` with `{ "members", "ttl_seconds" }`
//! - `GET /v1/sets/{key}` → `{ "members": [...] }` or 404

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{CoordinationStore, StoreError};

#[derive(Serialize)]
struct PutKeyRequest<'a> {
    value: &'a str,
    ttl_seconds: u64,
    if_absent: bool,
}

#[derive(Deserialize)]
struct GetKeyResponse {
    value: String,
}

#[derive(Serialize)]
struct AddMembersRequest<'a> {
    members: &'a [String],
    ttl_seconds: u64,
}

#[derive(Deserialize)]
struct GetMembersResponse {
    members: Vec<String>,
}

/// Client for a coordination store exposed over HTTP.
pub struct HttpStore {
    http: Client,
    base_url: String,
}

impl HttpStore {
    /// Create a new client for the given store URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn key_url(&self, key: &str) -> String {
        format!("{}/v1/keys/{}", self.base_url, key)
    }

    fn set_url(&self, key: &str) -> String {
        format!("{}/v1/sets/{}", self.base_url, key)
    }

    async fn put_key(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        if_absent: bool,
    ) -> Result<bool, StoreError> {
        let response = self
            .http
            .put(self.key_url(key))
            .json(&PutKeyRequest {
                value,
                ttl_seconds: ttl.as_secs(),
                if_absent,
            })
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::CONFLICT if if_absent => Ok(false),
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(StoreError::WriteRejected(format!(
                    "PUT {} failed ({}): {}",
                    key, status, text
                )))
            }
        }
    }
}

#[async_trait]
impl CoordinationStore for HttpStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>, StoreError> {
        let response = self.http.get(self.key_url(key)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: GetKeyResponse = response.json().await?;
                Ok(Some(body.value))
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(StoreError::InvalidResponse(format!(
                    "GET {} failed ({}): {}",
                    key, status, text
                )))
            }
        }
    }

    async fn set_value(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.put_key(key, value, ttl, false).await?;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let created = self.put_key(key, value, ttl, true).await?;
        debug!(key, created, "set-if-absent");
        Ok(created)
    }

    async fn add_to_set(
        &self,
        key: &str,
        members: &[String],
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let response = self
            .http
            .post(format!("{}/members", self.set_url(key)))
            .json(&AddMembersRequest {
                members,
                ttl_seconds: ttl.as_secs(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::WriteRejected(format!(
                "add to set {} failed ({}): {}",
                key, status, text
            )));
        }

        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let response = self.http.get(self.set_url(key)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            status if status.is_success() => {
                let body: GetMembersResponse = response.json().await?;
                Ok(body.members)
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(StoreError::InvalidResponse(format!(
                    "GET set {} failed ({}): {}",
                    key, status, text
                )))
            }
        }
    }
}
