//! Discord webhook notifications.
//!
//! Posts the batched alert text as a plain `content` message. The webhook
//! URL embeds its token, so it is kept behind `secrecy::Secret`.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::Notifier;
use crate::types::{Delivery, MonitorError};

/// Discord rejects message content longer than this.
const MAX_CONTENT_CHARS: usize = 2000;

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

pub struct DiscordNotifier {
    http: Client,
    webhook_url: Secret<String>,
    success_codes: Vec<u16>,
}

impl DiscordNotifier {
    pub fn new(
        webhook_url: Secret<String>,
        success_codes: Vec<u16>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::Delivery(format!("cannot build webhook client: {e}")))?;
        Ok(Self {
            http,
            webhook_url,
            success_codes,
        })
    }
}

/// Cut `text` to at most `max` characters, marking the cut.
fn truncate_content(text: &str, max: usize) -> std::borrow::Cow<'_, str> {
    if text.chars().count() <= max {
        return std::borrow::Cow::Borrowed(text);
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    std::borrow::Cow::Owned(cut)
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, text: &str) -> Result<Delivery> {
        let content = truncate_content(text, MAX_CONTENT_CHARS);
        if content.len() != text.len() {
            warn!(
                chars = text.chars().count(),
                max = MAX_CONTENT_CHARS,
                "Alert batch too long for Discord, truncating"
            );
        }

        let result = self
            .http
            .post(self.webhook_url.expose_secret())
            .json(&WebhookPayload { content: &content })
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status().as_u16();
                debug!(status, "Webhook responded");
                Ok(Delivery::from_status(status, &self.success_codes))
            }
            Err(e) => {
                // reqwest errors can echo the URL; strip it before logging.
                warn!(error = %e.without_url(), "Webhook request failed");
                Ok(Delivery::transport_failure())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
