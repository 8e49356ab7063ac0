//! HTTP notification source client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use chime_scheduler::{NotificationCandidate, NotificationSource, SourceUnavailable};

#[derive(Deserialize)]
struct CandidatesResponse {
    candidates: Vec<CandidateRecord>,
}

#[derive(Deserialize)]
struct CandidateRecord {
    id: String,
    intended_send_time: DateTime<Utc>,
}

/// Client for a notification provider exposed over HTTP.
///
/// Queries `GET /v1/notifications?start=...&end=...` (RFC 3339 bounds)
/// and expects `{ "candidates": [{ "id", "intended_send_time" }] }`.
pub struct HttpNotificationSource {
    http: Client,
    base_url: String,
}

impl HttpNotificationSource {
    /// Create a new client for the given provider URL.
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
}

#[async_trait]
impl NotificationSource for HttpNotificationSource {
    async fn query_candidates(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NotificationCandidate>, SourceUnavailable> {
        let response = self
            .http
            .get(format!("{}/v1/notifications", self.base_url))
            .query(&[("start", start.to_rfc3339()), ("end", end.to_rfc3339())])
            .send()
            .await
            .map_err(|e| SourceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceUnavailable(format!(
                "query failed ({})",
                response.status()
            )));
        }

        let body: CandidatesResponse = response
            .json()
            .await
            .map_err(|e| SourceUnavailable(e.to_string()))?;

        debug!(count = body.candidates.len(), "source returned candidates");

        Ok(body
            .candidates
            .into_iter()
            .map(|r| NotificationCandidate::new(r.id, r.intended_send_time))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param_contains};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn parses_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/notifications"))
            .and(query_param_contains("start", "2024"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [
                    { "id": "n-1", "intended_send_time": "2024-03-04T12:07:00Z" },
                    { "id": "n-2", "intended_send_time": "2024-03-04T12:03:00Z" },
                ]
            })))
            .mount(&server)
            .await;

        let source = HttpNotificationSource::new(server.uri());
        let start = "2024-03-04T12:00:00Z".parse().unwrap();
        let end = "2024-03-04T13:00:00Z".parse().unwrap();

        let candidates = source.query_candidates(start, end).await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].id, "n-1");
        assert_eq!(
            candidates[1].intended_send_time,
            "2024-03-04T12:03:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[tokio::test]
    async fn server_error_is_source_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/notifications"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HttpNotificationSource::new(server.uri());
        let result = source
            .query_candidates(Utc::now(), Utc::now())
            .await;
        assert!(result.is_err());
    }
}
