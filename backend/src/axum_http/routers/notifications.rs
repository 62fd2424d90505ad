use crate::{
    auth::AuthUser,
    axum_http::error_responses::ApiError,
    usecases::notifications::{EmailDispatcher, NotificationSender, NotificationUseCase},
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use parkbay::{
    domain::value_objects::notifications::{ContactRequest, EmailNotification, FeedbackRequest},
    infra::{
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{user_messages::UserMessagePostgres, user_roles::UserRolePostgres},
        },
        rate_limit::in_memory::InMemoryRateLimitStore,
    },
    notifications::resend_client::ResendClient,
};
use std::sync::Arc;
use tracing::info;

pub type NotificationService = NotificationUseCase<
    ResendClient,
    UserMessagePostgres,
    InMemoryRateLimitStore,
    UserRolePostgres,
>;

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    email_dispatcher: Arc<EmailDispatcher<ResendClient>>,
    rate_limits: Arc<InMemoryRateLimitStore>,
) -> Router {
    let user_message_repository = UserMessagePostgres::new(Arc::clone(&db_pool));
    let user_role_repository = UserRolePostgres::new(Arc::clone(&db_pool));
    let usecase = NotificationUseCase::new(
        email_dispatcher,
        Arc::new(user_message_repository),
        rate_limits,
        Arc::new(user_role_repository),
    );

    Router::new()
        .route("/notifications", post(send_notification))
        .route("/contact", post(submit_contact))
        .route("/feedback", post(submit_feedback))
        .with_state(Arc::new(usecase))
}

pub async fn send_notification(
    State(usecase): State<Arc<NotificationService>>,
    auth: AuthUser,
    Json(notification): Json<EmailNotification>,
) -> Response {
    let sender = NotificationSender {
        user_id: auth.user_id,
        email: auth.email.clone(),
        service_role: auth.is_service_role(),
    };
    match usecase.send(sender, notification).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn submit_contact(
    State(usecase): State<Arc<NotificationService>>,
    auth: Option<AuthUser>,
    Json(request): Json<ContactRequest>,
) -> Response {
    info!(signed_in = auth.is_some(), "contact: submission received");
    match usecase
        .submit_contact(auth.and_then(|a| a.account_id()), request)
        .await
    {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn submit_feedback(
    State(usecase): State<Arc<NotificationService>>,
    auth: Option<AuthUser>,
    Json(request): Json<FeedbackRequest>,
) -> Response {
    info!(signed_in = auth.is_some(), "feedback: submission received");
    match usecase
        .submit_feedback(auth.and_then(|a| a.account_id()), request)
        .await
    {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
