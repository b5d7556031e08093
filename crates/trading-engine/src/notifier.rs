use anyhow::Result;
use reqwest::Client;
use serde_json::json;

/// Webhook notifier for the external chat front end. Unconfigured (empty
/// URL) means every send is a silent no-op, so the engine runs headless.
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            webhook_url,
        })
    }

    pub async fn send_message(&self, content: &str) -> Result<()> {
        if self.webhook_url.is_empty() {
            tracing::debug!("notifier webhook not configured, skipping notification");
            return Ok(());
        }

        let payload = json!({
            "content": content,
            "username": "TradePulse Engine",
        });

        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        tracing::debug!("notification sent");
        Ok(())
    }
}
