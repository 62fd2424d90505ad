use anyhow::Result;
use async_trait::async_trait;
use reqwest::{RequestBuilder, header::AUTHORIZATION};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::domain::{
    repositories::auth_provider::AuthProvider, value_objects::email_verification::VerifiedUser,
};

/// Client for the Supabase Auth (GoTrue) REST endpoints used by the email flows.
pub struct SupabaseAuthClient {
    http: reqwest::Client,
    auth_url: String,
    service_role_key: String,
}

#[derive(Debug, Deserialize)]
struct SupabaseUserResp {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SupabaseSessionResp {
    user: SupabaseUserResp,
}

#[derive(Debug, Deserialize)]
struct SupabaseErrorResp {
    error_code: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
}

impl From<SupabaseUserResp> for VerifiedUser {
    fn from(value: SupabaseUserResp) -> Self {
        Self {
            user_id: value.id,
            email: value.email,
        }
    }
}

impl SupabaseAuthClient {
    pub fn new(project_url: &str, service_role_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            auth_url: format!("{}/auth/v1", project_url.trim_end_matches('/')),
            service_role_key,
        }
    }

    fn with_service_key(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_role_key)
            .header(AUTHORIZATION, format!("Bearer {}", self.service_role_key))
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let details = serde_json::from_str::<SupabaseErrorResp>(&body).ok();
        let error_code = details.as_ref().and_then(|d| d.error_code.clone());
        let message = details
            .and_then(|d| d.msg.or(d.error_description))
            .unwrap_or_else(|| "no error message".to_string());

        warn!(
            status = %status,
            error_code = ?error_code,
            context = %context,
            "auth: supabase request failed"
        );

        anyhow::bail!("Supabase Auth {context} failed (status {status}): {message}");
    }

    async fn verify(&self, body: serde_json::Value, context: &str) -> Result<VerifiedUser> {
        let resp = self
            .with_service_key(self.http.post(format!("{}/verify", self.auth_url)))
            .json(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, context).await?;

        let session: SupabaseSessionResp = resp.json().await?;
        Ok(session.user.into())
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuthClient {
    async fn verify_token_hash(&self, token_hash: &str, otp_type: &str) -> Result<VerifiedUser> {
        self.verify(
            json!({ "type": otp_type, "token_hash": token_hash }),
            "token hash verification",
        )
        .await
    }

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<VerifiedUser> {
        let resp = self
            .with_service_key(
                self.http
                    .post(format!("{}/token", self.auth_url))
                    .query(&[("grant_type", "pkce")]),
            )
            .json(&json!({ "auth_code": code, "code_verifier": code_verifier }))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "pkce code exchange").await?;

        let session: SupabaseSessionResp = resp.json().await?;
        Ok(session.user.into())
    }

    async fn user_from_access_token(&self, access_token: &str) -> Result<VerifiedUser> {
        let resp = self
            .http
            .get(format!("{}/user", self.auth_url))
            .header("apikey", &self.service_role_key)
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "access token lookup").await?;

        let user: SupabaseUserResp = resp.json().await?;
        Ok(user.into())
    }

    async fn verify_email_otp(
        &self,
        email: &str,
        token: &str,
        otp_type: &str,
    ) -> Result<VerifiedUser> {
        self.verify(
            json!({ "type": otp_type, "email": email, "token": token }),
            "email otp verification",
        )
        .await
    }

    async fn resend_signup_confirmation(&self, email: &str) -> Result<()> {
        let resp = self
            .with_service_key(self.http.post(format!("{}/resend", self.auth_url)))
            .json(&json!({ "type": "signup", "email": email }))
            .send()
            .await?;
        Self::ensure_success(resp, "resend confirmation").await?;

        Ok(())
    }
}
