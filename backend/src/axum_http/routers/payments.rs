use crate::{
    auth::AuthUser,
    axum_http::{error_responses::ApiError, routers::bookings::{BookingPaymentService, caller_of}},
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::post,
};
use parkbay::domain::value_objects::bookings::CreatePreAuthorizationRequest;
use std::sync::Arc;
use tracing::{info, warn};

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes(usecase: Arc<BookingPaymentService>) -> Router {
    Router::new()
        .route("/pre-authorizations", post(create_pre_authorization))
        .route("/webhook", post(payment_webhook))
        .with_state(usecase)
}

pub async fn create_pre_authorization(
    State(usecase): State<Arc<BookingPaymentService>>,
    auth: AuthUser,
    Json(request): Json<CreatePreAuthorizationRequest>,
) -> Response {
    info!(
        user_id = %auth.user_id,
        booking_id = %request.booking_id,
        "payments: pre-authorization request received"
    );
    match usecase
        .create_pre_authorization(caller_of(&auth), request)
        .await
    {
        Ok(response) => Json(response).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

/// Signature verification needs the body exactly as sent, so it is taken as raw bytes.
pub async fn payment_webhook(
    State(usecase): State<Arc<BookingPaymentService>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(signature) = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        warn!("payments: webhook without signature header");
        return ApiError::bad_request("Missing stripe-signature header").into_response();
    };

    match usecase.handle_webhook(&body, signature).await {
        Ok(ack) => Json(ack).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
