use crate::{
    axum_http::error_responses::ApiError,
    config::config_model::DotEnvyConfig,
    usecases::auth_emails::AuthEmailUseCase,
};
use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
};
use parkbay::{
    auth_provider::supabase_auth::SupabaseAuthClient,
    domain::value_objects::{
        email_verification::ConfirmEmailParams, rate_limits::RateLimitPolicy,
    },
    infra::rate_limit::in_memory::InMemoryRateLimitStore,
};
use serde::Deserialize;
use std::{sync::Arc, time::Duration};

pub type AuthEmailService = AuthEmailUseCase<SupabaseAuthClient, InMemoryRateLimitStore>;

#[derive(Debug, Deserialize)]
pub struct ResendConfirmationRequest {
    pub email: String,
}

pub fn routes(config: Arc<DotEnvyConfig>, rate_limits: Arc<InMemoryRateLimitStore>) -> Router {
    let auth_client = SupabaseAuthClient::new(
        &config.supabase.project_url,
        config.supabase.service_role_key.clone(),
    );
    let resend_policy = RateLimitPolicy {
        max_hits: config.confirmation_resend.max_hits,
        window: Duration::from_secs(config.confirmation_resend.window_secs),
    };
    let usecase = AuthEmailUseCase::new(Arc::new(auth_client), rate_limits, resend_policy);

    Router::new()
        .route("/resend-confirmation", post(resend_confirmation))
        .route("/confirm-email", post(confirm_email))
        .with_state(Arc::new(usecase))
}

pub async fn resend_confirmation(
    State(usecase): State<Arc<AuthEmailService>>,
    Json(request): Json<ResendConfirmationRequest>,
) -> Response {
    match usecase.resend_confirmation(&request.email).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn confirm_email(
    State(usecase): State<Arc<AuthEmailService>>,
    Json(params): Json<ConfirmEmailParams>,
) -> Response {
    match usecase.confirm_email(params).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
