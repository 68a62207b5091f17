mod git;
mod webhook;

pub use git::GitPublisher;
pub use webhook::WebhookPublisher;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_core::PublishConfig;

/// Something that takes a finished report file and makes it visible elsewhere.
#[async_trait]
pub trait ReportPublisher: Send + Sync {
    async fn publish(&self, path: &Path, message: &str) -> Result<(), PublishError>;
    fn name(&self) -> &str;
}

/// Errors from publishing. None of them fail a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("webhook error: {0}")]
    Webhook(String),
}

/// Expand `{date}` in the configured template.
pub fn commit_message(template: &str, now: DateTime<Utc>) -> String {
    template.replace("{date}", &now.format("%Y-%m-%d %H:%M").to_string())
}

/// Every configured publisher, attempted in order.
#[derive(Default)]
pub struct PublisherSet {
    publishers: Vec<Box<dyn ReportPublisher>>,
}

impl PublisherSet {
    pub fn from_config(config: &PublishConfig) -> Self {
        let mut set = Self::default();

        if config.git_enabled {
            set = set.with_publisher(GitPublisher::new(
                config.repo_root.clone(),
                config.branch.clone(),
                config.push_after_commit,
            ));
            tracing::info!(
                "Git publishing enabled ({}, push={})",
                config.repo_root.display(),
                config.push_after_commit
            );
        }

        if let Some(ref url) = config.webhook_url {
            set = set.with_publisher(WebhookPublisher::new(url.clone()));
            tracing::info!("Webhook publishing enabled");
        }

        if set.is_empty() {
            tracing::info!("No report publishers configured (set GIT_COMMIT_ENABLED or REPORT_WEBHOOK_URL)");
        }

        set
    }

    pub fn with_publisher(mut self, publisher: impl ReportPublisher + 'static) -> Self {
        self.publishers.push(Box::new(publisher));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    /// Publish through every channel. Failures are logged and returned, never short-circuit.
    pub async fn publish_all(&self, path: &Path, message: &str) -> Vec<String> {
        let mut errors = Vec::new();
        for publisher in &self.publishers {
            match publisher.publish(path, message).await {
                Ok(()) => tracing::info!("Published {} via {}", path.display(), publisher.name()),
                Err(e) => {
                    tracing::warn!("Failed to publish via {}: {}", publisher.name(), e);
                    errors.push(format!("{}: {}", publisher.name(), e));
                }
            }
        }
        errors
    }
}
