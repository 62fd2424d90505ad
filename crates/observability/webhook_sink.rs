use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use url::Url;

use super::alerts::{AlertEvent, AlertSink};

/// Discord-compatible chat webhooks cap a message at this many characters.
const MESSAGE_LIMIT: usize = 2000;
const TRUNCATED_SUFFIX: &str = "\n... (truncated)";

/// Posts alerts as `{ "content": ... }` to a chat webhook.
pub(crate) struct ChatWebhookSink {
    webhook_url: Url,
    client: Client,
}

impl ChatWebhookSink {
    pub(crate) fn new(webhook_url: Url) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(3)).build()?;
        Ok(Self {
            webhook_url,
            client,
        })
    }
}

pub(crate) fn render_alert(event: &AlertEvent) -> String {
    let mut lines = vec![format!(
        "**{}** `{}` `{}` `{}`",
        event.service_name,
        event.stage,
        event.component,
        event.level.as_str()
    )];

    let location = event
        .location
        .as_deref()
        .map(|loc| format!(" `{loc}`"))
        .unwrap_or_default();
    lines.push(format!(
        "`{}` `{}`{}",
        event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        event.target,
        location
    ));

    if let Some(message) = event.message.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        lines.push(format!("> {message}"));
    }

    if !event.spans.is_empty() {
        lines.push(format!("in: `{}`", event.spans.join(" > ")));
    }

    lines.extend(
        event
            .fields
            .iter()
            .map(|(key, value)| format!("- `{key}` = `{value}`")),
    );

    truncate(lines.join("\n"))
}

fn truncate(content: String) -> String {
    if content.chars().count() <= MESSAGE_LIMIT {
        return content;
    }

    let keep = MESSAGE_LIMIT - TRUNCATED_SUFFIX.chars().count();
    let mut truncated: String = content.chars().take(keep).collect();
    truncated.push_str(TRUNCATED_SUFFIX);
    truncated
}

#[async_trait]
impl AlertSink for ChatWebhookSink {
    async fn deliver(&self, event: &AlertEvent) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "content": render_alert(event) }))
            .send()
            .await
            // The reqwest error would echo the secret-bearing URL.
            .map_err(|err| {
                if err.is_timeout() {
                    anyhow!("ops webhook timed out")
                } else {
                    anyhow!("ops webhook request failed")
                }
            })?;

        if !response.status().is_success() {
            return Err(anyhow!("ops webhook returned {}", response.status()));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "chat_webhook"
    }
}
