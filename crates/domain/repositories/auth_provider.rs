use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::email_verification::VerifiedUser;

#[automock]
#[async_trait]
pub trait AuthProvider {
    async fn verify_token_hash(&self, token_hash: &str, otp_type: &str) -> Result<VerifiedUser>;

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<VerifiedUser>;

    async fn user_from_access_token(&self, access_token: &str) -> Result<VerifiedUser>;

    async fn verify_email_otp(&self, email: &str, token: &str, otp_type: &str)
    -> Result<VerifiedUser>;

    async fn resend_signup_confirmation(&self, email: &str) -> Result<()>;
}
