//! ntfy.sh client.
//!
//! Publishes a notification as a plain-text POST to `<base>/<topic>` with
//! the title, priority and tags carried in headers.

use std::time::Duration;

use ghostrun_core::Event;
use ghostrun_core::config::NotificationConfig;
use tracing::{debug, info, warn};

use super::{Notification, NotificationError, notification_for};
use crate::executor::EventObserver;

/// Client for one ntfy topic. Cheap to clone.
#[derive(Debug, Clone)]
pub struct NtfyNotifier {
    http: reqwest::Client,
    topic_url: String,
}

impl NtfyNotifier {
    /// Build a notifier from configuration, or `None` when no topic is set.
    pub fn from_config(config: &NotificationConfig) -> Result<Option<Self>, NotificationError> {
        match config.ntfy_topic.as_deref().filter(|t| !t.is_empty()) {
            Some(topic) => {
                let notifier = Self::new(&config.ntfy_base_url, topic, config.timeout())?;
                info!(topic_url = %notifier.topic_url, "ntfy notifications enabled");
                Ok(Some(notifier))
            }
            None => {
                info!("ntfy topic not set, notifications disabled");
                Ok(None)
            }
        }
    }

    pub fn new(base_url: &str, topic: &str, timeout: Duration) -> Result<Self, NotificationError> {
        // No-op if a provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Client(e.to_string()))?;
        Ok(Self::with_client(http, base_url, topic))
    }

    /// Use a pre-built HTTP client.
    pub fn with_client(http: reqwest::Client, base_url: &str, topic: &str) -> Self {
        Self {
            http,
            topic_url: format!("{}/{topic}", base_url.trim_end_matches('/')),
        }
    }

    pub fn topic_url(&self) -> &str {
        &self.topic_url
    }

    /// Publish `notification` and wait for the server's answer.
    pub async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        debug!(
            title = %notification.title,
            priority = notification.priority.as_str(),
            "Sending ntfy notification"
        );
        let response = self
            .http
            .post(&self.topic_url)
            .header("Title", &notification.title)
            .header("Priority", notification.priority.as_str())
            .header("Tags", notification.priority.tag())
            .body(notification.message.clone())
            .send()
            .await
            .map_err(|e| NotificationError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(title = %notification.title, "ntfy notification sent");
            Ok(())
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            Err(NotificationError::ApiError {
                status: status.as_u16(),
                body,
            })
        }
    }
}

impl EventObserver for NtfyNotifier {
    /// Fire and forget: delivery runs on its own task and failures are only logged.
    fn observe(&self, event: &Event) {
        let Some(notification) = notification_for(event) else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime available, dropping notification");
            return;
        };
        let notifier = self.clone();
        runtime.spawn(async move {
            if let Err(e) = notifier.send(&notification).await {
                warn!(error = %e, title = %notification.title, "Failed to send ntfy notification");
            }
        });
    }
}
