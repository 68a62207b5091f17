use std::path::Path;

use async_trait::async_trait;

use crate::{PublishError, ReportPublisher};

/// Posts a one-line notice to a chat webhook.
pub struct WebhookPublisher {
    webhook_url: String,
    client: reqwest::Client,
}

impl WebhookPublisher {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ReportPublisher for WebhookPublisher {
    async fn publish(&self, path: &Path, message: &str) -> Result<(), PublishError> {
        let payload = serde_json::json!({
            "text": format!("{}: {}", message, path.display()),
        });

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PublishError::Webhook(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PublishError::Webhook(format!("HTTP {}", response.status().as_u16())));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}
