//! Notification boundary and the Discord webhook implementation
//!
//! Delivery is fire-and-forget from the caller's point of view: the tracker
//! logs a failed send and moves on.

use super::types::Notification;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug)]
pub enum NotifyError {
    Http(reqwest::Error),
    Rejected(reqwest::StatusCode),
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Http(err)
    }
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Http(e) => write!(f, "HTTP error: {}", e),
            NotifyError::Rejected(s) => write!(f, "Webhook rejected message: {}", s),
        }
    }
}

impl std::error::Error for NotifyError {}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, Serialize)]
struct WebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    embeds: Vec<WebhookEmbed>,
    allowed_mentions: AllowedMentions,
}

#[derive(Debug, Serialize)]
struct WebhookEmbed {
    title: String,
    description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<WebhookField>,
}

#[derive(Debug, Serialize)]
struct WebhookField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Debug, Serialize)]
struct AllowedMentions {
    parse: Vec<&'static str>,
}

impl From<&Notification> for WebhookPayload {
    fn from(notification: &Notification) -> Self {
        // Embeds never ping, so role mentions go into the plain content
        let content = if notification.mention_roles.is_empty() {
            None
        } else {
            Some(
                notification
                    .mention_roles
                    .iter()
                    .map(|role| format!("<@&{}>", role))
                    .collect::<Vec<_>>()
                    .join(" "),
            )
        };

        WebhookPayload {
            content,
            embeds: vec![WebhookEmbed {
                title: notification.title.clone(),
                description: notification.body.clone(),
                fields: notification
                    .fields
                    .iter()
                    .map(|(name, value)| WebhookField {
                        name: name.clone(),
                        value: value.clone(),
                        inline: true,
                    })
                    .collect(),
            }],
            allowed_mentions: AllowedMentions {
                parse: vec!["roles"],
            },
        }
    }
}

/// Posts notifications to a Discord channel webhook
pub struct DiscordWebhookNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl DiscordWebhookNotifier {
    pub fn new(webhook_url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            webhook_url: webhook_url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for DiscordWebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload = WebhookPayload::from(notification);
        let response = self.client.post(&self.webhook_url).json(&payload).send().await?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status()));
        }

        log::debug!("📨 Delivered notification '{}'", notification.title);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let notification = Notification::new("Weekly playtime", "table")
            .with_field("From", "2024-03-04")
            .with_field("To", "2024-03-10");

        let json = serde_json::to_value(WebhookPayload::from(&notification)).unwrap();

        assert!(json.get("content").is_none());
        assert_eq!(json["embeds"][0]["title"], "Weekly playtime");
        assert_eq!(json["embeds"][0]["description"], "table");
        assert_eq!(json["embeds"][0]["fields"][0]["name"], "From");
        assert_eq!(json["embeds"][0]["fields"][1]["value"], "2024-03-10");
        assert_eq!(json["allowed_mentions"]["parse"][0], "roles");
    }

    #[test]
    fn test_role_mentions_go_to_content() {
        let roles = vec!["111".to_string(), "222".to_string()];
        let notification = Notification::new("Seed call", "Seeding has started.").with_mentions(&roles);

        let json = serde_json::to_value(WebhookPayload::from(&notification)).unwrap();

        assert_eq!(json["content"], "<@&111> <@&222>");
        assert!(json["embeds"][0].get("fields").is_none());
    }
}
