//! Webhook dispatcher.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use chime_scheduler::{DispatchError, Dispatcher};

#[derive(Serialize)]
struct DispatchRequest<'a> {
    ids: &'a [String],
}

/// Delivers notification batches by POSTing id lists to a webhook.
pub struct WebhookDispatcher {
    http: Client,
    url: String,
}

impl WebhookDispatcher {
    /// Create a new dispatcher for the given webhook URL.
    pub fn new(url: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Dispatcher for WebhookDispatcher {
    async fn dispatch(&self, batch: &[String]) -> Result<(), DispatchError> {
        let response = self
            .http
            .post(&self.url)
            .json(&DispatchRequest { ids: batch })
            .send()
            .await
            .map_err(|e| DispatchError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(DispatchError(format!(
                "webhook rejected batch ({}): {}",
                status, text
            )));
        }

        debug!(count = batch.len(), "batch delivered to webhook");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn posts_batch_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(json!({ "ids": ["a", "b"] })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = WebhookDispatcher::new(format!("{}/hook", server.uri()));
        dispatcher
            .dispatch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejection_is_a_dispatch_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let dispatcher = WebhookDispatcher::new(format!("{}/hook", server.uri()));
        let err = dispatcher
            .dispatch(&["a".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("webhook rejected"));
    }
}
