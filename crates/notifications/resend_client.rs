use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::error;

use crate::domain::{
    repositories::email_gateway::EmailGateway, value_objects::notifications::OutboundEmail,
};

const RESEND_API: &str = "https://api.resend.com";

/// Transactional email over the Resend HTTP API.
pub struct ResendClient {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ResendSendResp {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ResendErrorResp {
    name: Option<String>,
    message: Option<String>,
}

impl ResendClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    /// https://resend.com/docs/api-reference/emails/send-email
    pub async fn send_email(&self, email: &OutboundEmail) -> Result<String> {
        let resp = self
            .http
            .post(format!("{RESEND_API}/emails"))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(email)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let details = serde_json::from_str::<ResendErrorResp>(&body).ok();

            error!(
                status = %status,
                resend_error = ?details.as_ref().and_then(|d| d.name.clone()),
                subject = %email.subject,
                response_body = %body,
                "notifications: resend send failed"
            );

            let message = details
                .and_then(|d| d.message)
                .unwrap_or_else(|| "no error message".to_string());
            anyhow::bail!("Resend API request failed (status {status}): {message}");
        }

        let parsed: ResendSendResp = resp.json().await?;
        Ok(parsed.id)
    }
}

#[async_trait]
impl EmailGateway for ResendClient {
    async fn send(&self, email: OutboundEmail) -> Result<String> {
        self.send_email(&email).await
    }
}
