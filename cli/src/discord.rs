use std::time::Duration;

use async_trait::async_trait;
use poller::{AlertEvent, Notifier, NotifyError};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error};

use crate::render::format_price;

const ALERT_COLOR: u32 = 0xE74C3C;

/// Posts fired alerts to a Discord channel through an incoming webhook,
/// mentioning the alert role and crediting whoever set the alert.
#[derive(Clone)]
pub struct DiscordWebhookNotifier {
    http: Client,
    webhook_url: String,
    role_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WebhookMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    embeds: Vec<Embed>,
    allowed_mentions: AllowedMentions,
}

#[derive(Debug, Serialize)]
struct AllowedMentions {
    roles: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Embed {
    description: String,
    color: u32,
    timestamp: String,
    author: EmbedAuthor,
}

#[derive(Debug, Serialize)]
struct EmbedAuthor {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_url: Option<String>,
}

impl DiscordWebhookNotifier {
    pub fn new(
        webhook_url: impl Into<String>,
        role_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            webhook_url: webhook_url.into(),
            role_id,
        })
    }

    fn message_for(&self, event: &AlertEvent) -> WebhookMessage {
        let description = format!(
            "{}\n\nCurrent price: ${} ({:+.2}%)",
            event.message,
            format_price(event.price),
            event.deviation_pct
        );

        let owner = &event.owner;
        WebhookMessage {
            content: self.role_id.as_ref().map(|id| format!("<@&{id}>")),
            embeds: vec![Embed {
                description,
                color: ALERT_COLOR,
                timestamp: event.fired_at.to_rfc3339(),
                author: EmbedAuthor {
                    name: owner.display_name.clone(),
                    icon_url: Some(owner.avatar_ref.clone()).filter(|url| !url.is_empty()),
                },
            }],
            allowed_mentions: AllowedMentions {
                roles: self.role_id.iter().cloned().collect(),
            },
        }
    }
}

#[async_trait]
impl Notifier for DiscordWebhookNotifier {
    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        let message = self.message_for(event);

        let response = self
            .http
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await
            .map_err(|e| NotifyError::DeliveryFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(ticker = %event.ticker, "alert posted to discord");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %body, "discord webhook rejected alert");
        Err(NotifyError::DeliveryFailed(format!("discord returned {status}: {body}")))
    }
}
