use crate::{
    auth::AuthUser,
    axum_http::error_responses::ApiError,
    usecases::{
        booking_payments::{BookingPaymentUseCase, BookingPolicy, Caller},
        notifications::EmailDispatcher,
    },
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use parkbay::{
    domain::value_objects::bookings::{
        CancelBookingRequest, CapturePreAuthorizationRequest, SubmitBookingRequest,
    },
    infra::{
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{
                bookings::BookingPostgres, listings::ListingPostgres,
                payment_provider_customers::PaymentProviderCustomerPostgres,
                spaces::SpacePostgres, user_roles::UserRolePostgres,
            },
        },
        realtime::change_feed::ChangeFeed,
    },
    notifications::resend_client::ResendClient,
    payments::stripe_client::StripeClient,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub type BookingPaymentService = BookingPaymentUseCase<
    BookingPostgres,
    ListingPostgres,
    SpacePostgres,
    PaymentProviderCustomerPostgres,
    UserRolePostgres,
    StripeClient,
    ResendClient,
>;

pub fn build_usecase(
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
    email_dispatcher: Arc<EmailDispatcher<ResendClient>>,
    change_feed: ChangeFeed,
    policy: BookingPolicy,
) -> Arc<BookingPaymentService> {
    let booking_repository = BookingPostgres::new(Arc::clone(&db_pool));
    let listing_repository = ListingPostgres::new(Arc::clone(&db_pool));
    let space_repository = SpacePostgres::new(Arc::clone(&db_pool));
    let customer_repository =
        PaymentProviderCustomerPostgres::new(Arc::clone(&db_pool), Arc::clone(&stripe_client));
    let user_role_repository = UserRolePostgres::new(Arc::clone(&db_pool));

    Arc::new(BookingPaymentUseCase::new(
        Arc::new(booking_repository),
        Arc::new(listing_repository),
        Arc::new(space_repository),
        Arc::new(customer_repository),
        Arc::new(user_role_repository),
        stripe_client,
        email_dispatcher,
        change_feed,
        policy,
    ))
}

pub fn routes(usecase: Arc<BookingPaymentService>) -> Router {
    Router::new()
        .route("/", post(submit_booking))
        .route("/:booking_id", get(get_booking))
        .route("/:booking_id/confirm-payment", post(confirm_payment))
        .route("/:booking_id/capture", post(capture_pre_authorization))
        .route("/:booking_id/reject", post(reject_booking))
        .route("/:booking_id/refund", post(refund_payment))
        .with_state(usecase)
}

pub(crate) fn caller_of(auth: &AuthUser) -> Caller {
    Caller {
        user_id: auth.user_id,
        service_role: auth.is_service_role(),
    }
}

pub async fn submit_booking(
    State(usecase): State<Arc<BookingPaymentService>>,
    auth: AuthUser,
    Json(request): Json<SubmitBookingRequest>,
) -> Response {
    info!(
        user_id = %auth.user_id,
        listing_id = %request.listing_id,
        "bookings: submit request received"
    );
    match usecase
        .submit_booking(caller_of(&auth), auth.email.clone(), request)
        .await
    {
        Ok(booking) => (StatusCode::CREATED, Json(booking)).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn get_booking(
    State(usecase): State<Arc<BookingPaymentService>>,
    auth: AuthUser,
    Path(booking_id): Path<Uuid>,
) -> Response {
    match usecase.get_booking(caller_of(&auth), booking_id).await {
        Ok(booking) => Json(booking).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn confirm_payment(
    State(usecase): State<Arc<BookingPaymentService>>,
    auth: AuthUser,
    Path(booking_id): Path<Uuid>,
) -> Response {
    info!(user_id = %auth.user_id, %booking_id, "bookings: confirm payment request received");
    match usecase.confirm_payment(caller_of(&auth), booking_id).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn capture_pre_authorization(
    State(usecase): State<Arc<BookingPaymentService>>,
    auth: AuthUser,
    Path(booking_id): Path<Uuid>,
    request: Option<Json<CapturePreAuthorizationRequest>>,
) -> Response {
    info!(user_id = %auth.user_id, %booking_id, "bookings: capture request received");
    let request = request.map(|Json(r)| r).unwrap_or_default();
    match usecase
        .capture_pre_authorization(caller_of(&auth), booking_id, request)
        .await
    {
        Ok(response) => Json(response).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn reject_booking(
    State(usecase): State<Arc<BookingPaymentService>>,
    auth: AuthUser,
    Path(booking_id): Path<Uuid>,
    request: Option<Json<CancelBookingRequest>>,
) -> Response {
    info!(user_id = %auth.user_id, %booking_id, "bookings: reject request received");
    let request = request.map(|Json(r)| r).unwrap_or_default();
    match usecase
        .reject_booking(caller_of(&auth), booking_id, request)
        .await
    {
        Ok(response) => Json(response).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn refund_payment(
    State(usecase): State<Arc<BookingPaymentService>>,
    auth: AuthUser,
    Path(booking_id): Path<Uuid>,
    request: Option<Json<CancelBookingRequest>>,
) -> Response {
    info!(user_id = %auth.user_id, %booking_id, "bookings: refund request received");
    let request = request.map(|Json(r)| r).unwrap_or_default();
    match usecase
        .refund_payment(caller_of(&auth), booking_id, request)
        .await
    {
        Ok(response) => Json(response).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
