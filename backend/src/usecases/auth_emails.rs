use std::sync::Arc;

use axum::http::StatusCode;
use parkbay::domain::{
    repositories::{auth_provider::AuthProvider, rate_limits::RateLimitStore},
    value_objects::{
        email_verification::{
            ConfirmEmailParams, ConfirmEmailResponse, VerificationMethod, VerifiedUser,
            verification_methods,
        },
        notifications::is_valid_email,
        rate_limits::{RateLimitDecision, RateLimitPolicy},
    },
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum AuthEmailError {
    #[error("a valid email address is required")]
    InvalidEmail,
    #[error("too many confirmation emails requested, retry in {0} seconds")]
    RateLimited(u64),
    #[error("no verification parameters supplied")]
    MissingVerificationParams,
    #[error("email verification failed (tried: {})", .0.join(", "))]
    VerificationFailed(Vec<&'static str>),
    #[error("auth provider failed: {0}")]
    Provider(anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthEmailError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthEmailError::InvalidEmail
            | AuthEmailError::MissingVerificationParams
            | AuthEmailError::VerificationFailed(_) => StatusCode::BAD_REQUEST,
            AuthEmailError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AuthEmailError::Provider(_) => StatusCode::BAD_GATEWAY,
            AuthEmailError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, AuthEmailError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResendConfirmationResponse {
    pub success: bool,
    pub message: &'static str,
}

pub struct AuthEmailUseCase<A, R>
where
    A: AuthProvider + Send + Sync + 'static,
    R: RateLimitStore + Send + Sync + 'static,
{
    auth_provider: Arc<A>,
    rate_limits: Arc<R>,
    resend_policy: RateLimitPolicy,
}

impl<A, R> AuthEmailUseCase<A, R>
where
    A: AuthProvider + Send + Sync + 'static,
    R: RateLimitStore + Send + Sync + 'static,
{
    pub fn new(auth_provider: Arc<A>, rate_limits: Arc<R>, resend_policy: RateLimitPolicy) -> Self {
        Self {
            auth_provider,
            rate_limits,
            resend_policy,
        }
    }

    pub async fn resend_confirmation(
        &self,
        email: &str,
    ) -> UseCaseResult<ResendConfirmationResponse> {
        let email = email.trim().to_ascii_lowercase();
        if !is_valid_email(&email) {
            return Err(AuthEmailError::InvalidEmail);
        }

        let decision = self
            .rate_limits
            .hit(&format!("resend-confirmation:{email}"), self.resend_policy)
            .await
            .map_err(|err| {
                error!(error = ?err, "auth: rate limit store failed");
                AuthEmailError::Internal(err)
            })?;

        if let RateLimitDecision::Limited { retry_after } = decision {
            let retry_after_secs = retry_after.as_secs().max(1);
            warn!(retry_after_secs, "auth: resend confirmation rate limited");
            return Err(AuthEmailError::RateLimited(retry_after_secs));
        }

        self.auth_provider
            .resend_signup_confirmation(&email)
            .await
            .map_err(|err| {
                error!(error = ?err, "auth: resend confirmation failed");
                AuthEmailError::Provider(err)
            })?;

        info!("auth: confirmation email resent");
        Ok(ResendConfirmationResponse {
            success: true,
            message: "Confirmation email sent",
        })
    }

    /// Tries each applicable verification method once, in priority order. The first
    /// success wins.
    pub async fn confirm_email(
        &self,
        params: ConfirmEmailParams,
    ) -> UseCaseResult<ConfirmEmailResponse> {
        let methods = verification_methods(&params);
        if methods.is_empty() {
            return Err(AuthEmailError::MissingVerificationParams);
        }

        let mut attempted = Vec::with_capacity(methods.len());
        for method in methods {
            let name = method.name();
            attempted.push(name);

            match self.verify(&method).await {
                Ok(user) => {
                    info!(method = name, user_id = %user.user_id, "auth: email confirmed");
                    return Ok(ConfirmEmailResponse {
                        success: true,
                        method: name,
                        user,
                    });
                }
                Err(err) => {
                    warn!(method = name, error = %err, "auth: verification method failed");
                }
            }
        }

        Err(AuthEmailError::VerificationFailed(attempted))
    }

    async fn verify(&self, method: &VerificationMethod) -> anyhow::Result<VerifiedUser> {
        match method {
            VerificationMethod::TokenHash {
                token_hash,
                otp_type,
            } => self.auth_provider.verify_token_hash(token_hash, otp_type).await,
            VerificationMethod::PkceCode {
                code,
                code_verifier,
            } => self.auth_provider.exchange_code(code, code_verifier).await,
            VerificationMethod::AccessToken { access_token } => {
                self.auth_provider.user_from_access_token(access_token).await
            }
            VerificationMethod::EmailOtp {
                email,
                token,
                otp_type,
            } => self.auth_provider.verify_email_otp(email, token, otp_type).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkbay::domain::repositories::{
        auth_provider::MockAuthProvider, rate_limits::MockRateLimitStore,
    };
    use std::time::Duration;

    fn policy() -> RateLimitPolicy {
        RateLimitPolicy {
            max_hits: 1,
            window: Duration::from_secs(60),
        }
    }

    fn verified() -> VerifiedUser {
        VerifiedUser {
            user_id: "7d0c".into(),
            email: Some("renter@example.com".into()),
        }
    }

    #[tokio::test]
    async fn resend_is_keyed_by_lowercased_email() {
        let mut limits = MockRateLimitStore::new();
        limits
            .expect_hit()
            .withf(|key: &str, _| key == "resend-confirmation:renter@example.com")
            .times(1)
            .returning(|_, _| Ok(RateLimitDecision::Allowed { remaining: 0 }));

        let mut provider = MockAuthProvider::new();
        provider
            .expect_resend_signup_confirmation()
            .withf(|email: &str| email == "renter@example.com")
            .times(1)
            .returning(|_| Ok(()));

        let usecase = AuthEmailUseCase::new(Arc::new(provider), Arc::new(limits), policy());
        let response = usecase
            .resend_confirmation(" Renter@Example.com ")
            .await
            .unwrap();

        assert!(response.success);
    }

    #[tokio::test]
    async fn resend_over_limit_is_429_without_provider_call() {
        let mut limits = MockRateLimitStore::new();
        limits.expect_hit().returning(|_, _| {
            Ok(RateLimitDecision::Limited {
                retry_after: Duration::from_secs(45),
            })
        });

        let mut provider = MockAuthProvider::new();
        provider.expect_resend_signup_confirmation().never();

        let usecase = AuthEmailUseCase::new(Arc::new(provider), Arc::new(limits), policy());
        let err = usecase
            .resend_confirmation("renter@example.com")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthEmailError::RateLimited(45)));
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn resend_rejects_malformed_email() {
        let usecase = AuthEmailUseCase::new(
            Arc::new(MockAuthProvider::new()),
            Arc::new(MockRateLimitStore::new()),
            policy(),
        );

        let err = usecase.resend_confirmation("renter").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn confirm_falls_through_to_next_method() {
        let mut provider = MockAuthProvider::new();
        provider
            .expect_verify_token_hash()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("otp expired")));
        provider
            .expect_user_from_access_token()
            .withf(|token: &str| token == "jwt")
            .times(1)
            .returning(|_| Ok(verified()));

        let usecase = AuthEmailUseCase::new(
            Arc::new(provider),
            Arc::new(MockRateLimitStore::new()),
            policy(),
        );
        let response = usecase
            .confirm_email(ConfirmEmailParams {
                token_hash: Some("hash".into()),
                access_token: Some("jwt".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(response.method, "access_token");
        assert_eq!(response.user, verified());
    }

    #[tokio::test]
    async fn confirm_reports_every_attempted_method() {
        let mut provider = MockAuthProvider::new();
        provider
            .expect_verify_token_hash()
            .returning(|_, _| Err(anyhow::anyhow!("invalid")));
        provider
            .expect_verify_email_otp()
            .returning(|_, _, _| Err(anyhow::anyhow!("invalid")));

        let usecase = AuthEmailUseCase::new(
            Arc::new(provider),
            Arc::new(MockRateLimitStore::new()),
            policy(),
        );
        let err = usecase
            .confirm_email(ConfirmEmailParams {
                token_hash: Some("hash".into()),
                email: Some("renter@example.com".into()),
                token: Some("123456".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();

        match err {
            AuthEmailError::VerificationFailed(attempted) => {
                assert_eq!(attempted, vec!["token_hash", "email_otp"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn confirm_without_params_is_bad_request() {
        let usecase = AuthEmailUseCase::new(
            Arc::new(MockAuthProvider::new()),
            Arc::new(MockRateLimitStore::new()),
            policy(),
        );

        let err = usecase
            .confirm_email(ConfirmEmailParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthEmailError::MissingVerificationParams));
    }
}
