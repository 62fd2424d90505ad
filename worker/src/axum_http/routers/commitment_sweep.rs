use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    config::config_model::DotEnvyConfig,
    usecases::subscription_commitments::{CommitmentSweepParams, SubscriptionCommitmentUseCase},
};

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_WORKER/internal/v1/subscriptions/sweep" \
//     -H "Authorization: Bearer $INTERNAL_SWEEP_TOKEN" \
//     -H "Content-Type: application/json" \
//     -d '{"dry_run":true}'

#[derive(Clone)]
pub struct CommitmentSweepRouteState {
    config: Arc<DotEnvyConfig>,
    usecase: Arc<SubscriptionCommitmentUseCase>,
}

pub fn routes(config: Arc<DotEnvyConfig>, usecase: Arc<SubscriptionCommitmentUseCase>) -> Router {
    Router::new()
        .route("/sweep", post(sweep_commitments))
        .with_state(CommitmentSweepRouteState { config, usecase })
}

#[derive(Debug, Deserialize)]
pub struct CommitmentSweepRequest {
    pub dry_run: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct CommitmentSweepResponse {
    pub scanned: usize,
    pub due: usize,
    pub cancelled: usize,
    pub failed: usize,
    pub skipped: usize,
    pub dry_run: bool,
    pub due_ids: Vec<Uuid>,
    pub cancelled_ids: Vec<Uuid>,
    pub failed_ids: Vec<Uuid>,
}

pub async fn sweep_commitments(
    State(state): State<CommitmentSweepRouteState>,
    headers: HeaderMap,
    payload: Option<Json<CommitmentSweepRequest>>,
) -> Response {
    let Some(expected_token) = state.config.sweep.internal_token.as_deref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "sweep token is not configured",
        )
            .into_response();
    };

    if let Err(status) = authorize_bearer(&headers, expected_token) {
        warn!("commitment_sweep: rejected unauthorized trigger");
        return (status, "unauthorized").into_response();
    }

    let params = CommitmentSweepParams {
        dry_run: payload
            .and_then(|Json(body)| body.dry_run)
            .unwrap_or(false),
    };

    match state.usecase.run(params).await {
        Ok(result) => Json(CommitmentSweepResponse {
            scanned: result.scanned,
            due: result.due,
            cancelled: result.cancelled,
            failed: result.failed,
            skipped: result.skipped,
            dry_run: params.dry_run,
            due_ids: result.due_ids,
            cancelled_ids: result.cancelled_ids,
            failed_ids: result.failed_ids,
        })
        .into_response(),
        Err(err) => {
            error!(error = ?err, "commitment_sweep: usecase failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "sweep failed").into_response()
        }
    }
}

fn authorize_bearer(headers: &HeaderMap, expected_token: &str) -> Result<(), StatusCode> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if token == expected_token {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_must_match() {
        assert!(authorize_bearer(&headers("Bearer s3cret"), "s3cret").is_ok());
        assert_eq!(
            authorize_bearer(&headers("Bearer other"), "s3cret"),
            Err(StatusCode::UNAUTHORIZED)
        );
    }

    #[test]
    fn missing_or_malformed_header_is_unauthorized() {
        assert_eq!(
            authorize_bearer(&HeaderMap::new(), "s3cret"),
            Err(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(
            authorize_bearer(&headers("Basic s3cret"), "s3cret"),
            Err(StatusCode::UNAUTHORIZED)
        );
    }
}
