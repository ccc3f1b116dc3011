//! SendGrid v3 mail-send client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::config::EmailConfig;

use super::{ExpiryNotice, Notifier, SendError};

#[derive(Debug, Serialize)]
struct MailRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: &'a str,
    content: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    asm: Option<Asm>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: &'static str,
    value: String,
}

/// Unsubscribe group; the preferences page avoids one-click unsubscribes by link scanners.
#[derive(Debug, Serialize)]
struct Asm {
    group_id: u32,
    groups_to_display: Vec<u32>,
}

pub struct SendGridNotifier {
    client: Client,
    config: EmailConfig,
}

impl SendGridNotifier {
    pub fn new(config: EmailConfig) -> Result<Self, SendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SendError::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn build_request<'a>(&'a self, email: &'a str, notice: &'a ExpiryNotice) -> MailRequest<'a> {
        let with_preferences = self.config.unsubscribe_group_id.is_some();

        MailRequest {
            personalizations: vec![Personalization {
                to: vec![Address { email, name: None }],
            }],
            from: Address {
                email: &self.config.from_email,
                name: Some(&self.config.from_name),
            },
            subject: &notice.subject,
            // SendGrid requires text/plain before text/html
            content: vec![
                Content {
                    content_type: "text/plain",
                    value: notice.render_text(with_preferences),
                },
                Content {
                    content_type: "text/html",
                    value: notice.render_html(with_preferences),
                },
            ],
            asm: self.config.unsubscribe_group_id.map(|group_id| Asm {
                group_id,
                groups_to_display: vec![group_id],
            }),
        }
    }
}

#[async_trait]
impl Notifier for SendGridNotifier {
    async fn send(&self, email: &str, notice: &ExpiryNotice) -> Result<(), SendError> {
        tracing::info!(
            email = %email,
            resource_id = %notice.resource_id,
            auths = notice.items.len(),
            "Sending notification email"
        );

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&self.build_request(email, notice))
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(email = %email, status = %status.as_u16(), body = %body, "Email provider rejected message");
            return Err(SendError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(email = %email, status = %status.as_u16(), "Email sent");
        Ok(())
    }
}
