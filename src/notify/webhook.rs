//! Webhook delivery over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{build_payload, AlertEvent, NotifyError, Notifier};

/// Overall bound on one webhook request.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts alerts as Discord embeds.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
    hostname: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, hostname: String) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            hostname,
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        let payload = build_payload(event, &self.hostname);

        let response = self.client.post(&self.url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Host label for alerts: the configured override, else the system host name.
pub fn resolve_hostname(configured: Option<&str>) -> String {
    match configured {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string()),
    }
}
