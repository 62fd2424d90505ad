use std::{sync::Arc, time::Duration};

use axum::http::StatusCode;
use parkbay::{
    domain::{
        entities::user_messages::InsertUserMessageEntity,
        repositories::{
            email_gateway::EmailGateway, rate_limits::RateLimitStore,
            user_messages::UserMessageRepository, user_roles::UserRoleRepository,
        },
        value_objects::{
            notifications::{
                ContactRequest, EmailNotification, FeedbackRequest, NotificationResponse,
                UserMessageResponse, is_valid_email,
            },
            rate_limits::{RateLimitDecision, RateLimitPolicy},
        },
    },
    notifications::templates::{self, TemplateError, TemplateSettings},
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Contact and feedback submissions allowed per sender email.
const USER_MESSAGE_POLICY: RateLimitPolicy = RateLimitPolicy {
    max_hits: 5,
    window: Duration::from_secs(3600),
};
const MAX_MESSAGE_CHARS: usize = 5000;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("invalid notification: {0}")]
    InvalidPayload(String),
    #[error("not allowed to send this notification")]
    Forbidden,
    #[error("too many requests, retry in {0} seconds")]
    RateLimited(u64),
    #[error("email provider failed: {0}")]
    Delivery(anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl NotificationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            NotificationError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            NotificationError::Forbidden => StatusCode::FORBIDDEN,
            NotificationError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            NotificationError::Delivery(_) => StatusCode::BAD_GATEWAY,
            NotificationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TemplateError> for NotificationError {
    fn from(err: TemplateError) -> Self {
        NotificationError::InvalidPayload(err.to_string())
    }
}

pub type UseCaseResult<T> = std::result::Result<T, NotificationError>;

/// Renders notifications and hands them to the email provider.
pub struct EmailDispatcher<E>
where
    E: EmailGateway + Send + Sync + 'static,
{
    email_gateway: Arc<E>,
    settings: TemplateSettings,
}

impl<E> EmailDispatcher<E>
where
    E: EmailGateway + Send + Sync + 'static,
{
    pub fn new(email_gateway: Arc<E>, settings: TemplateSettings) -> Self {
        Self {
            email_gateway,
            settings,
        }
    }

    pub async fn dispatch(
        &self,
        notification: &EmailNotification,
    ) -> UseCaseResult<NotificationResponse> {
        let kind = notification.kind();
        let email = templates::render(notification, &self.settings).map_err(|err| {
            warn!(kind, error = %err, "notifications: template rejected payload");
            NotificationError::from(err)
        })?;

        let message_id = self.email_gateway.send(email).await.map_err(|err| {
            error!(kind, error = ?err, "notifications: email send failed");
            NotificationError::Delivery(err)
        })?;

        info!(kind, %message_id, "notifications: email sent");
        Ok(NotificationResponse {
            success: true,
            kind,
            message_id,
        })
    }

    /// Sends without failing the caller. Returns whether the email went out.
    pub async fn dispatch_best_effort(&self, notification: &EmailNotification) -> bool {
        match self.dispatch(notification).await {
            Ok(_) => true,
            Err(err) => {
                warn!(
                    kind = notification.kind(),
                    error = %err,
                    "notifications: continuing without email"
                );
                false
            }
        }
    }
}

/// Who asked for a notification through the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSender {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub service_role: bool,
}

pub struct NotificationUseCase<E, M, R, U>
where
    E: EmailGateway + Send + Sync + 'static,
    M: UserMessageRepository + Send + Sync + 'static,
    R: RateLimitStore + Send + Sync + 'static,
    U: UserRoleRepository + Send + Sync + 'static,
{
    dispatcher: Arc<EmailDispatcher<E>>,
    user_message_repo: Arc<M>,
    rate_limits: Arc<R>,
    user_role_repo: Arc<U>,
}

impl<E, M, R, U> NotificationUseCase<E, M, R, U>
where
    E: EmailGateway + Send + Sync + 'static,
    M: UserMessageRepository + Send + Sync + 'static,
    R: RateLimitStore + Send + Sync + 'static,
    U: UserRoleRepository + Send + Sync + 'static,
{
    pub fn new(
        dispatcher: Arc<EmailDispatcher<E>>,
        user_message_repo: Arc<M>,
        rate_limits: Arc<R>,
        user_role_repo: Arc<U>,
    ) -> Self {
        Self {
            dispatcher,
            user_message_repo,
            rate_limits,
            user_role_repo,
        }
    }

    /// Users may only address themselves; admins and the service role may send anything.
    pub async fn send(
        &self,
        sender: NotificationSender,
        notification: EmailNotification,
    ) -> UseCaseResult<NotificationResponse> {
        let kind = notification.kind();
        info!(user_id = %sender.user_id, kind, "notifications: send requested");

        if !sender.service_role && !is_self_addressed(&notification, sender.email.as_deref()) {
            let is_admin = self
                .user_role_repo
                .is_admin(sender.user_id)
                .await
                .map_err(|err| {
                    error!(user_id = %sender.user_id, db_error = ?err, "notifications: failed to load roles");
                    NotificationError::Internal(err)
                })?;
            if !is_admin {
                warn!(user_id = %sender.user_id, kind, "notifications: send denied");
                return Err(NotificationError::Forbidden);
            }
        }

        self.dispatcher.dispatch(&notification).await
    }

    pub async fn submit_contact(
        &self,
        sender_id: Option<Uuid>,
        request: ContactRequest,
    ) -> UseCaseResult<UserMessageResponse> {
        let (name, email, message) = validate_sender(&request.name, &request.email, &request.message)?;
        let subject = request
            .subject
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        self.check_rate_limit("contact", &email).await?;

        let message_id = self
            .store("contact", sender_id, &name, &email, subject.clone(), &message)
            .await?;

        let forwarded = self
            .dispatcher
            .dispatch_best_effort(&EmailNotification::ContactForm {
                name,
                email,
                subject,
                message,
            })
            .await;

        Ok(UserMessageResponse {
            success: true,
            message_id,
            forwarded,
        })
    }

    pub async fn submit_feedback(
        &self,
        sender_id: Option<Uuid>,
        request: FeedbackRequest,
    ) -> UseCaseResult<UserMessageResponse> {
        let (name, email, message) = validate_sender(&request.name, &request.email, &request.message)?;
        if let Some(rating) = request.rating {
            if !(1..=5).contains(&rating) {
                return Err(NotificationError::InvalidPayload(
                    "rating must be between 1 and 5".to_string(),
                ));
            }
        }

        self.check_rate_limit("feedback", &email).await?;

        let subject = request.rating.map(|r| format!("rating {r}/5"));
        let message_id = self
            .store("feedback", sender_id, &name, &email, subject, &message)
            .await?;

        let forwarded = self
            .dispatcher
            .dispatch_best_effort(&EmailNotification::Feedback {
                name,
                email,
                rating: request.rating,
                message,
            })
            .await;

        Ok(UserMessageResponse {
            success: true,
            message_id,
            forwarded,
        })
    }

    async fn check_rate_limit(&self, kind: &str, email: &str) -> UseCaseResult<()> {
        let key = format!("{kind}:{email}");
        let decision = self
            .rate_limits
            .hit(&key, USER_MESSAGE_POLICY)
            .await
            .map_err(|err| {
                error!(kind, error = ?err, "notifications: rate limit store failed");
                NotificationError::Internal(err)
            })?;

        match decision {
            RateLimitDecision::Allowed { .. } => Ok(()),
            RateLimitDecision::Limited { retry_after } => {
                warn!(kind, "notifications: submission rate limited");
                Err(NotificationError::RateLimited(retry_after.as_secs().max(1)))
            }
        }
    }

    async fn store(
        &self,
        kind: &str,
        sender_id: Option<Uuid>,
        name: &str,
        email: &str,
        subject: Option<String>,
        message: &str,
    ) -> UseCaseResult<Uuid> {
        let message_id = self
            .user_message_repo
            .insert_message(InsertUserMessageEntity {
                sender_id,
                kind: kind.to_string(),
                name: name.to_string(),
                email: email.to_string(),
                subject,
                message: message.to_string(),
            })
            .await
            .map_err(|err| {
                error!(kind, db_error = ?err, "notifications: failed to store user message");
                NotificationError::Internal(err)
            })?;

        info!(kind, %message_id, "notifications: user message stored");
        Ok(message_id)
    }
}

fn validate_sender(
    name: &str,
    email: &str,
    message: &str,
) -> UseCaseResult<(String, String, String)> {
    let name = name.trim();
    let email = email.trim().to_ascii_lowercase();
    let message = message.trim();

    if name.is_empty() || message.is_empty() {
        return Err(NotificationError::InvalidPayload(
            "name and message are required".to_string(),
        ));
    }
    if !is_valid_email(&email) {
        return Err(NotificationError::InvalidPayload(
            "a valid email address is required".to_string(),
        ));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(NotificationError::InvalidPayload(format!(
            "message must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }

    Ok((name.to_string(), email, message.to_string()))
}

fn is_self_addressed(notification: &EmailNotification, own_email: Option<&str>) -> bool {
    let Some(own_email) = own_email.map(str::trim).filter(|e| !e.is_empty()) else {
        return false;
    };
    let target = match notification {
        EmailNotification::ListingSubmitted { owner_email, .. } => Some(owner_email.as_str()),
        other => other.recipient(),
    };
    target.is_some_and(|target| target.trim().eq_ignore_ascii_case(own_email))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkbay::domain::repositories::{
        email_gateway::MockEmailGateway, rate_limits::MockRateLimitStore,
        user_messages::MockUserMessageRepository, user_roles::MockUserRoleRepository,
    };

    fn settings() -> TemplateSettings {
        TemplateSettings {
            from: "Parkbay <noreply@parkbay.test>".into(),
            admin_email: "admin@parkbay.test".into(),
            frontend_url: "https://parkbay.test".into(),
            currency: "gbp".into(),
        }
    }

    type TestUseCase = NotificationUseCase<
        MockEmailGateway,
        MockUserMessageRepository,
        MockRateLimitStore,
        MockUserRoleRepository,
    >;

    fn usecase(
        gateway: MockEmailGateway,
        messages: MockUserMessageRepository,
        limits: MockRateLimitStore,
    ) -> TestUseCase {
        with_roles(gateway, messages, limits, MockUserRoleRepository::new())
    }

    fn with_roles(
        gateway: MockEmailGateway,
        messages: MockUserMessageRepository,
        limits: MockRateLimitStore,
        roles: MockUserRoleRepository,
    ) -> TestUseCase {
        NotificationUseCase::new(
            Arc::new(EmailDispatcher::new(Arc::new(gateway), settings())),
            Arc::new(messages),
            Arc::new(limits),
            Arc::new(roles),
        )
    }

    fn renter() -> NotificationSender {
        NotificationSender {
            user_id: Uuid::new_v4(),
            email: Some("Renter@Example.com".into()),
            service_role: false,
        }
    }

    fn service() -> NotificationSender {
        NotificationSender {
            user_id: Uuid::nil(),
            email: None,
            service_role: true,
        }
    }

    fn allow_all() -> MockRateLimitStore {
        let mut limits = MockRateLimitStore::new();
        limits
            .expect_hit()
            .returning(|_, _| Ok(RateLimitDecision::Allowed { remaining: 4 }));
        limits
    }

    fn contact() -> ContactRequest {
        ContactRequest {
            name: "Alex".into(),
            email: "Alex@Example.com".into(),
            subject: Some("Question".into()),
            message: "Is the bay covered?".into(),
        }
    }

    #[tokio::test]
    async fn send_returns_provider_message_id() {
        let mut gateway = MockEmailGateway::new();
        gateway
            .expect_send()
            .withf(|email| email.to == vec!["renter@example.com".to_string()])
            .times(1)
            .returning(|_| Ok("msg_123".to_string()));

        let usecase = usecase(gateway, MockUserMessageRepository::new(), MockRateLimitStore::new());
        let response = usecase
            .send(
                renter(),
                EmailNotification::Welcome {
                    to: "renter@example.com".into(),
                    name: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(response.kind, "welcome");
        assert_eq!(response.message_id, "msg_123");
    }

    #[tokio::test]
    async fn provider_failure_is_bad_gateway() {
        let mut gateway = MockEmailGateway::new();
        gateway
            .expect_send()
            .returning(|_| Err(anyhow::anyhow!("resend down")));

        let usecase = usecase(gateway, MockUserMessageRepository::new(), MockRateLimitStore::new());
        let err = usecase
            .send(
                renter(),
                EmailNotification::Welcome {
                    to: "renter@example.com".into(),
                    name: None,
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn malformed_recipient_is_bad_request_and_not_sent() {
        let mut gateway = MockEmailGateway::new();
        gateway.expect_send().never();

        let usecase = usecase(gateway, MockUserMessageRepository::new(), MockRateLimitStore::new());
        let err = usecase
            .send(
                service(),
                EmailNotification::Welcome {
                    to: "nobody".into(),
                    name: None,
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn renter_cannot_email_other_addresses() {
        let mut gateway = MockEmailGateway::new();
        gateway.expect_send().never();

        let mut roles = MockUserRoleRepository::new();
        roles.expect_is_admin().times(1).returning(|_| Ok(false));

        let usecase = with_roles(
            gateway,
            MockUserMessageRepository::new(),
            MockRateLimitStore::new(),
            roles,
        );
        let err = usecase
            .send(
                renter(),
                EmailNotification::PaymentRefunded {
                    to: "victim@example.com".into(),
                    renter_name: None,
                    listing_title: "Covered bay".into(),
                    amount: Some(15.0),
                    reason: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, NotificationError::Forbidden));
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_may_email_any_address() {
        let mut gateway = MockEmailGateway::new();
        gateway
            .expect_send()
            .times(1)
            .returning(|_| Ok("msg_admin".to_string()));

        let mut roles = MockUserRoleRepository::new();
        roles.expect_is_admin().times(1).returning(|_| Ok(true));

        let usecase = with_roles(
            gateway,
            MockUserMessageRepository::new(),
            MockRateLimitStore::new(),
            roles,
        );
        let response = usecase
            .send(
                renter(),
                EmailNotification::ListingApproved {
                    to: "owner@example.com".into(),
                    owner_name: None,
                    listing_title: "Covered bay".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(response.kind, "listing_approved");
    }

    #[test]
    fn listing_submission_counts_as_self_addressed_for_its_owner() {
        let notification = EmailNotification::ListingSubmitted {
            listing_id: Uuid::new_v4(),
            owner_email: "owner@example.com".into(),
            listing_title: "Covered bay".into(),
            address: "1 Station Road".into(),
        };

        assert!(is_self_addressed(&notification, Some("OWNER@example.com")));
        assert!(!is_self_addressed(&notification, Some("renter@example.com")));
        assert!(!is_self_addressed(&notification, None));
    }

    #[tokio::test]
    async fn contact_is_stored_then_forwarded_to_admin() {
        let message_id = Uuid::new_v4();

        let mut messages = MockUserMessageRepository::new();
        messages
            .expect_insert_message()
            .withf(|entity| entity.kind == "contact" && entity.email == "alex@example.com")
            .times(1)
            .returning(move |_| Ok(message_id));

        let mut gateway = MockEmailGateway::new();
        gateway
            .expect_send()
            .withf(|email| {
                email.to == vec!["admin@parkbay.test".to_string()]
                    && email.reply_to.as_deref() == Some("alex@example.com")
            })
            .times(1)
            .returning(|_| Ok("msg_1".to_string()));

        let response = usecase(gateway, messages, allow_all())
            .submit_contact(None, contact())
            .await
            .unwrap();

        assert_eq!(response.message_id, message_id);
        assert!(response.forwarded);
    }

    #[tokio::test]
    async fn contact_survives_email_failure() {
        let mut messages = MockUserMessageRepository::new();
        messages
            .expect_insert_message()
            .returning(|_| Ok(Uuid::new_v4()));

        let mut gateway = MockEmailGateway::new();
        gateway
            .expect_send()
            .returning(|_| Err(anyhow::anyhow!("resend down")));

        let response = usecase(gateway, messages, allow_all())
            .submit_contact(None, contact())
            .await
            .unwrap();

        assert!(response.success);
        assert!(!response.forwarded);
    }

    #[tokio::test]
    async fn rate_limited_contact_is_not_stored() {
        let mut limits = MockRateLimitStore::new();
        limits
            .expect_hit()
            .withf(|key: &str, _| key == "contact:alex@example.com")
            .returning(|_, _| {
                Ok(RateLimitDecision::Limited {
                    retry_after: Duration::from_secs(30),
                })
            });

        let mut messages = MockUserMessageRepository::new();
        messages.expect_insert_message().never();

        let err = usecase(MockEmailGateway::new(), messages, limits)
            .submit_contact(None, contact())
            .await
            .unwrap_err();

        assert!(matches!(err, NotificationError::RateLimited(30)));
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn feedback_rating_is_validated() {
        let err = usecase(
            MockEmailGateway::new(),
            MockUserMessageRepository::new(),
            MockRateLimitStore::new(),
        )
        .submit_feedback(
            None,
            FeedbackRequest {
                name: "Alex".into(),
                email: "alex@example.com".into(),
                rating: Some(9),
                message: "Great".into(),
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn sender_fields_are_required() {
        assert!(validate_sender("", "alex@example.com", "hi").is_err());
        assert!(validate_sender("Alex", "alex", "hi").is_err());
        assert!(validate_sender("Alex", "alex@example.com", "   ").is_err());
        assert_eq!(
            validate_sender(" Alex ", "ALEX@example.com", " hi ").unwrap(),
            ("Alex".to_string(), "alex@example.com".to_string(), "hi".to_string())
        );
    }
}
