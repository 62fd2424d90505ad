use std::{collections::HashMap, sync::Arc};

use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use parkbay::{
    domain::{
        entities::bookings::{BookingEntity, InsertBookingEntity, UpdateBookingEntity},
        repositories::{
            bookings::BookingRepository, email_gateway::EmailGateway,
            listings::ListingRepository,
            payment_gateway::{PaymentGateway, PreAuthorizationSessionRequest},
            payment_provider_customers::PaymentProviderCustomerRepository,
            spaces::SpaceRepository, user_roles::UserRoleRepository,
        },
        value_objects::{
            amounts::{
                apply_provider_floor, pre_authorization_amount, to_major_units, to_minor_units,
            },
            bookings::{
                BookingDto, BookingPaymentResponse, CancelBookingRequest,
                CapturePreAuthorizationRequest, CreatePreAuthorizationRequest,
                PreAuthorizationResponse, SubmitBookingRequest, commitment_end,
            },
            change_feed::TableChange,
            enums::{
                booking_statuses::BookingStatus, payment_statuses::PaymentStatus,
                payment_types::PaymentType,
            },
            notifications::{EmailNotification, is_valid_email},
        },
    },
    infra::realtime::change_feed::ChangeFeed,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::usecases::notifications::EmailDispatcher;

const FALLBACK_LISTING_TITLE: &str = "your parking space";

#[derive(Debug, Error)]
pub enum BookingPaymentError {
    #[error("booking not found")]
    BookingNotFound,
    #[error("listing not found")]
    ListingNotFound,
    #[error("not allowed to act on this booking")]
    Forbidden,
    #[error("payment status cannot move from {from} to {to}")]
    IllegalTransition {
        from: String,
        to: PaymentStatus,
    },
    #[error("pre-authorization expired at {0}")]
    PreAuthorizationExpired(DateTime<Utc>),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid webhook: {0}")]
    InvalidWebhook(String),
    #[error("payment provider failed: {0}")]
    PaymentProvider(anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BookingPaymentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingPaymentError::BookingNotFound | BookingPaymentError::ListingNotFound => {
                StatusCode::NOT_FOUND
            }
            BookingPaymentError::Forbidden => StatusCode::FORBIDDEN,
            BookingPaymentError::IllegalTransition { .. } => StatusCode::CONFLICT,
            BookingPaymentError::PreAuthorizationExpired(_)
            | BookingPaymentError::InvalidRequest(_)
            | BookingPaymentError::InvalidWebhook(_) => StatusCode::BAD_REQUEST,
            BookingPaymentError::PaymentProvider(_) => StatusCode::BAD_GATEWAY,
            BookingPaymentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, BookingPaymentError>;

/// Time limits applied when a pre-authorization is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingPolicy {
    pub pre_authorization_expiry_days: i64,
    pub confirmation_window_hours: i64,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            pre_authorization_expiry_days: 7,
            confirmation_window_hours: 48,
        }
    }
}

/// Identity the workflow acts for, taken from the verified access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub service_role: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WebhookAck {
    pub received: bool,
    pub event_type: String,
    pub handled: bool,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    id: String,
    payment_intent: Option<String>,
    subscription: Option<String>,
    customer: Option<String>,
    metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct InvoiceObject {
    id: Option<String>,
    subscription: Option<String>,
}

pub struct BookingPaymentUseCase<B, L, S, C, R, G, E>
where
    B: BookingRepository + Send + Sync + 'static,
    L: ListingRepository + Send + Sync + 'static,
    S: SpaceRepository + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    R: UserRoleRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    E: EmailGateway + Send + Sync + 'static,
{
    booking_repo: Arc<B>,
    listing_repo: Arc<L>,
    space_repo: Arc<S>,
    customer_repo: Arc<C>,
    user_role_repo: Arc<R>,
    payment_gateway: Arc<G>,
    email_dispatcher: Arc<EmailDispatcher<E>>,
    change_feed: ChangeFeed,
    policy: BookingPolicy,
}

impl<B, L, S, C, R, G, E> BookingPaymentUseCase<B, L, S, C, R, G, E>
where
    B: BookingRepository + Send + Sync + 'static,
    L: ListingRepository + Send + Sync + 'static,
    S: SpaceRepository + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    R: UserRoleRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    E: EmailGateway + Send + Sync + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        booking_repo: Arc<B>,
        listing_repo: Arc<L>,
        space_repo: Arc<S>,
        customer_repo: Arc<C>,
        user_role_repo: Arc<R>,
        payment_gateway: Arc<G>,
        email_dispatcher: Arc<EmailDispatcher<E>>,
        change_feed: ChangeFeed,
        policy: BookingPolicy,
    ) -> Self {
        Self {
            booking_repo,
            listing_repo,
            space_repo,
            customer_repo,
            user_role_repo,
            payment_gateway,
            email_dispatcher,
            change_feed,
            policy,
        }
    }

    pub async fn submit_booking(
        &self,
        caller: Caller,
        renter_email: Option<String>,
        request: SubmitBookingRequest,
    ) -> UseCaseResult<BookingDto> {
        // The service role has no renter account to book for.
        if caller.service_role {
            return Err(BookingPaymentError::Forbidden);
        }
        if request.duration < 1 {
            return Err(BookingPaymentError::InvalidRequest(
                "duration must be at least one month".to_string(),
            ));
        }

        let listing = self
            .listing_repo
            .find_by_id(request.listing_id)
            .await
            .map_err(|err| {
                error!(
                    listing_id = %request.listing_id,
                    db_error = ?err,
                    "bookings: failed to load listing"
                );
                BookingPaymentError::Internal(err)
            })?
            .ok_or(BookingPaymentError::ListingNotFound)?;

        if !listing.is_bookable() {
            return Err(BookingPaymentError::InvalidRequest(
                "listing is not accepting bookings".to_string(),
            ));
        }

        if let Some(space_id) = request.space_id {
            let spaces = self
                .space_repo
                .list_by_listing_ids(vec![listing.id])
                .await
                .map_err(|err| {
                    error!(listing_id = %listing.id, db_error = ?err, "bookings: failed to load spaces");
                    BookingPaymentError::Internal(err)
                })?;
            if !spaces.iter().any(|space| space.id == space_id) {
                return Err(BookingPaymentError::InvalidRequest(
                    "space does not belong to the listing".to_string(),
                ));
            }
        }

        let end_time = commitment_end(request.start_time, request.duration).ok_or_else(|| {
            BookingPaymentError::InvalidRequest("booking end is out of range".to_string())
        })?;
        let total_amount_minor = listing
            .price_per_month_minor
            .checked_mul(i64::from(request.duration))
            .ok_or_else(|| {
                BookingPaymentError::InvalidRequest("booking total is out of range".to_string())
            })?;

        // Recurring rows keep the committed months in `duration_hours`.
        let duration_hours = match request.payment_type {
            PaymentType::Recurring => request.duration,
            PaymentType::OneTime => i32::try_from((end_time - request.start_time).num_hours())
                .map_err(|_| {
                    BookingPaymentError::InvalidRequest("booking is too long".to_string())
                })?,
        };

        let booking = self
            .booking_repo
            .create_booking(InsertBookingEntity {
                user_id: caller.user_id,
                listing_id: listing.id,
                space_id: request.space_id,
                start_time: request.start_time,
                end_time,
                duration_hours,
                status: BookingStatus::PendingReview.as_str().to_string(),
                payment_status: PaymentStatus::Pending.as_str().to_string(),
                payment_type: request.payment_type.as_str().to_string(),
                total_amount_minor,
                renter_email: renter_email.map(|e| e.trim().to_ascii_lowercase()),
            })
            .await
            .map_err(|err| {
                error!(
                    user_id = %caller.user_id,
                    listing_id = %listing.id,
                    db_error = ?err,
                    "bookings: failed to create booking"
                );
                BookingPaymentError::Internal(err)
            })?;

        info!(
            booking_id = %booking.id,
            listing_id = %listing.id,
            payment_type = %request.payment_type,
            total_amount_minor,
            "bookings: booking submitted"
        );
        self.change_feed.publish(TableChange::ParkingBookings);

        Ok(BookingDto::from(booking))
    }

    pub async fn get_booking(&self, caller: Caller, booking_id: Uuid) -> UseCaseResult<BookingDto> {
        let booking = self.load_booking(booking_id).await?;
        self.ensure_renter_or_admin(caller, &booking).await?;
        Ok(BookingDto::from(booking))
    }

    pub async fn create_pre_authorization(
        &self,
        caller: Caller,
        request: CreatePreAuthorizationRequest,
    ) -> UseCaseResult<PreAuthorizationResponse> {
        let booking = self.load_booking(request.booking_id).await?;
        self.ensure_renter_or_admin(caller, &booking).await?;
        let current = Self::current_payment_status(&booking)?;
        if current != PaymentStatus::Pending {
            return Err(BookingPaymentError::IllegalTransition {
                from: current.as_str().to_string(),
                to: PaymentStatus::PreAuthorized,
            });
        }

        let email = request.email.trim().to_ascii_lowercase();
        if !is_valid_email(&email) {
            return Err(BookingPaymentError::InvalidRequest(
                "a valid email address is required".to_string(),
            ));
        }

        let requested_minor = Self::requested_amount_minor(&request)?;
        let amount_minor = apply_provider_floor(requested_minor);
        let amount_adjusted = amount_minor != requested_minor;
        if amount_adjusted {
            info!(
                booking_id = %booking.id,
                requested_minor,
                amount_minor,
                "payments: amount raised to provider minimum"
            );
        }

        let payment_type = booking.payment_type();
        let session_amount_minor = match payment_type {
            PaymentType::OneTime => amount_minor,
            PaymentType::Recurring => {
                Self::recurring_period_amount_minor(&request, &booking, amount_minor)?
            }
        };

        let customer_id = self
            .customer_repo
            .find_or_create_stripe_customer_id(booking.user_id, &email)
            .await
            .map_err(|err| {
                error!(
                    booking_id = %booking.id,
                    error = ?err,
                    "payments: failed to resolve provider customer"
                );
                BookingPaymentError::PaymentProvider(err)
            })?;

        let now = Utc::now();
        let expires_at = now + Duration::days(self.policy.pre_authorization_expiry_days);
        let confirmation_deadline =
            (now + Duration::hours(self.policy.confirmation_window_hours)).min(expires_at);

        let session = self
            .payment_gateway
            .create_pre_authorization_session(PreAuthorizationSessionRequest {
                booking_id: booking.id,
                customer_id: customer_id.clone(),
                payment_type,
                amount_minor: session_amount_minor,
                description: format!("Parking booking {}", booking.id),
                hold_until: expires_at,
            })
            .await
            .map_err(|err| {
                error!(
                    booking_id = %booking.id,
                    error = ?err,
                    "payments: failed to open checkout session"
                );
                BookingPaymentError::PaymentProvider(err)
            })?;

        self.persist(
            booking.id,
            UpdateBookingEntity {
                renter_email: Some(email),
                stripe_customer_id: Some(customer_id),
                stripe_session_id: Some(session.id.clone()),
                stripe_payment_intent_id: session.payment_intent_id.clone(),
                stripe_subscription_id: session.subscription_id.clone(),
                pre_authorization_amount_minor: Some(amount_minor),
                pre_authorization_expires_at: Some(expires_at),
                confirmation_deadline: Some(confirmation_deadline),
                ..Default::default()
            },
        )
        .await?;

        info!(
            booking_id = %booking.id,
            session_id = %session.id,
            payment_type = %payment_type,
            amount_minor,
            %expires_at,
            "payments: pre-authorization session created"
        );

        Ok(PreAuthorizationResponse {
            success: true,
            booking_id: booking.id,
            session_id: session.id,
            checkout_url: session.url,
            amount: to_major_units(amount_minor),
            amount_adjusted,
            expires_at,
        })
    }

    pub async fn handle_webhook(&self, payload: &[u8], signature: &str) -> UseCaseResult<WebhookAck> {
        let event = self
            .payment_gateway
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                warn!(error = %err, "payments: webhook verification failed");
                BookingPaymentError::InvalidWebhook("signature verification failed".to_string())
            })?;

        info!(
            event_id = ?event.id,
            event_type = %event.event_type,
            "payments: webhook verified"
        );

        let handled = match event.event_type.as_str() {
            "checkout.session.completed" => self.handle_checkout_completed(event.object).await?,
            "invoice.payment_succeeded" => self.handle_invoice_paid(event.object).await?,
            other => {
                debug!(event_type = other, "payments: ignoring webhook event");
                false
            }
        };

        Ok(WebhookAck {
            received: true,
            event_type: event.event_type,
            handled,
        })
    }

    async fn handle_checkout_completed(&self, object: serde_json::Value) -> UseCaseResult<bool> {
        let session: CheckoutSessionObject = serde_json::from_value(object).map_err(|err| {
            warn!(error = %err, "payments: malformed checkout session in webhook");
            BookingPaymentError::InvalidWebhook("malformed checkout session".to_string())
        })?;

        let mut booking = self
            .booking_repo
            .find_by_stripe_session_id(&session.id)
            .await
            .map_err(|err| {
                error!(session_id = %session.id, db_error = ?err, "payments: failed to load booking by session");
                BookingPaymentError::Internal(err)
            })?;

        if booking.is_none() {
            let metadata_booking_id = session
                .metadata
                .as_ref()
                .and_then(|metadata| metadata.get("booking_id"))
                .and_then(|value| Uuid::parse_str(value).ok());
            if let Some(booking_id) = metadata_booking_id {
                booking = self.booking_repo.find_by_id(booking_id).await.map_err(|err| {
                    error!(%booking_id, db_error = ?err, "payments: failed to load booking");
                    BookingPaymentError::Internal(err)
                })?;
            }
        }

        let Some(booking) = booking else {
            warn!(session_id = %session.id, "payments: checkout session matches no booking");
            return Ok(false);
        };

        let current = Self::current_payment_status(&booking)?;
        if current == PaymentStatus::PreAuthorized {
            info!(booking_id = %booking.id, "payments: checkout completion already applied");
            return Ok(true);
        }
        if !current.can_transition_to(PaymentStatus::PreAuthorized) {
            warn!(
                booking_id = %booking.id,
                payment_status = %current,
                "payments: late checkout completion ignored"
            );
            return Ok(false);
        }

        let updated = self
            .persist(
                booking.id,
                UpdateBookingEntity {
                    payment_status: Some(PaymentStatus::PreAuthorized.as_str().to_string()),
                    stripe_session_id: Some(session.id.clone()),
                    stripe_payment_intent_id: session.payment_intent.clone(),
                    stripe_subscription_id: session.subscription.clone(),
                    stripe_customer_id: session.customer.clone(),
                    ..Default::default()
                },
            )
            .await?;

        info!(
            booking_id = %updated.id,
            session_id = %session.id,
            "payments: booking pre-authorized"
        );

        let listing_title = self.listing_title(updated.listing_id).await;
        let amount = to_major_units(
            updated
                .pre_authorization_amount_minor
                .unwrap_or(updated.total_amount_minor),
        );
        if let Some(to) = updated.renter_email.clone() {
            self.email_dispatcher
                .dispatch_best_effort(&EmailNotification::BookingReceived {
                    to: to.clone(),
                    renter_name: None,
                    listing_title: listing_title.clone(),
                    start_time: updated.start_time,
                    end_time: updated.end_time,
                    amount,
                })
                .await;
            self.email_dispatcher
                .dispatch_best_effort(&EmailNotification::AdminNewBooking {
                    booking_id: updated.id,
                    listing_title,
                    renter_email: to,
                    start_time: updated.start_time,
                    amount,
                    payment_type: updated.payment_type.clone(),
                })
                .await;
        } else {
            warn!(booking_id = %updated.id, "payments: booking has no renter email, skipping emails");
        }

        Ok(true)
    }

    async fn handle_invoice_paid(&self, object: serde_json::Value) -> UseCaseResult<bool> {
        let invoice: InvoiceObject = serde_json::from_value(object).map_err(|err| {
            warn!(error = %err, "payments: malformed invoice in webhook");
            BookingPaymentError::InvalidWebhook("malformed invoice".to_string())
        })?;

        let Some(subscription_id) = invoice.subscription else {
            debug!(invoice_id = ?invoice.id, "payments: invoice without subscription ignored");
            return Ok(false);
        };

        let booking = self
            .booking_repo
            .find_by_stripe_subscription_id(&subscription_id)
            .await
            .map_err(|err| {
                error!(%subscription_id, db_error = ?err, "payments: failed to load booking by subscription");
                BookingPaymentError::Internal(err)
            })?;
        let Some(booking) = booking else {
            debug!(%subscription_id, "payments: invoice for unknown subscription ignored");
            return Ok(false);
        };

        // The zero-amount trial invoice arrives before approval and must not mark anything paid.
        let current = Self::current_payment_status(&booking)?;
        if !matches!(current, PaymentStatus::Confirmed | PaymentStatus::Paid) {
            debug!(
                booking_id = %booking.id,
                payment_status = %current,
                "payments: invoice before confirmation ignored"
            );
            return Ok(false);
        }

        self.persist(
            booking.id,
            UpdateBookingEntity {
                payment_status: Some(PaymentStatus::Paid.as_str().to_string()),
                ..Default::default()
            },
        )
        .await?;

        info!(
            booking_id = %booking.id,
            invoice_id = ?invoice.id,
            "payments: subscription invoice paid"
        );
        Ok(true)
    }

    /// Admin approval. One-time bookings capture the full hold, recurring bookings end the
    /// trial so billing starts.
    pub async fn confirm_payment(
        &self,
        caller: Caller,
        booking_id: Uuid,
    ) -> UseCaseResult<BookingPaymentResponse> {
        self.ensure_admin(caller).await?;
        let booking = self.load_booking(booking_id).await?;
        Self::ensure_transition(&booking, PaymentStatus::Confirmed)?;

        let captured_amount_minor = match booking.payment_type() {
            PaymentType::OneTime => {
                Self::ensure_not_expired(&booking, Utc::now())?;
                let payment_intent_id = Self::payment_intent_id(&booking)?;
                let captured = self
                    .payment_gateway
                    .capture_payment_intent(payment_intent_id, None)
                    .await
                    .map_err(|err| {
                        error!(%booking_id, error = ?err, "payments: capture failed");
                        BookingPaymentError::PaymentProvider(err)
                    })?;
                Some(captured.amount_received_minor)
            }
            PaymentType::Recurring => {
                let subscription_id = booking.stripe_subscription_id.as_deref().ok_or_else(|| {
                    BookingPaymentError::InvalidRequest("booking has no subscription".to_string())
                })?;
                self.payment_gateway
                    .end_subscription_trial(subscription_id)
                    .await
                    .map_err(|err| {
                        error!(%booking_id, error = ?err, "payments: failed to start subscription billing");
                        BookingPaymentError::PaymentProvider(err)
                    })?;
                None
            }
        };

        let updated = self
            .persist(
                booking_id,
                UpdateBookingEntity {
                    status: Some(BookingStatus::Confirmed.as_str().to_string()),
                    payment_status: Some(PaymentStatus::Confirmed.as_str().to_string()),
                    captured_amount_minor,
                    ..Default::default()
                },
            )
            .await?;

        info!(%booking_id, ?captured_amount_minor, "payments: booking confirmed");

        if let Some(to) = updated.renter_email.clone() {
            let listing = self.listing_repo.find_by_id(updated.listing_id).await.ok().flatten();
            self.email_dispatcher
                .dispatch_best_effort(&EmailNotification::BookingConfirmed {
                    to,
                    renter_name: None,
                    listing_title: listing
                        .as_ref()
                        .map(|l| l.title.clone())
                        .unwrap_or_else(|| FALLBACK_LISTING_TITLE.to_string()),
                    address: listing.map(|l| l.address),
                    start_time: updated.start_time,
                    end_time: updated.end_time,
                    amount: to_major_units(
                        captured_amount_minor.unwrap_or(updated.total_amount_minor),
                    ),
                })
                .await;
        }

        Ok(Self::response(&updated, None))
    }

    pub async fn capture_pre_authorization(
        &self,
        caller: Caller,
        booking_id: Uuid,
        request: CapturePreAuthorizationRequest,
    ) -> UseCaseResult<BookingPaymentResponse> {
        self.ensure_admin(caller).await?;
        let booking = self.load_booking(booking_id).await?;
        let current = Self::current_payment_status(&booking)?;
        if current != PaymentStatus::PreAuthorized {
            return Err(BookingPaymentError::IllegalTransition {
                from: current.as_str().to_string(),
                to: PaymentStatus::Confirmed,
            });
        }
        if booking.payment_type() == PaymentType::Recurring {
            return Err(BookingPaymentError::InvalidRequest(
                "recurring bookings are confirmed, not captured".to_string(),
            ));
        }
        Self::ensure_not_expired(&booking, Utc::now())?;

        let authorized_minor = booking.pre_authorization_amount_minor.ok_or_else(|| {
            BookingPaymentError::InvalidRequest("booking has no authorized amount".to_string())
        })?;
        let capture_minor = match request.capture_amount {
            Some(amount) => Self::parse_amount(amount, "capture_amount")?,
            None => authorized_minor,
        };
        let deposit_minor = match request.security_deposit {
            Some(amount) => Self::parse_amount(amount, "security_deposit")?,
            None => 0,
        };

        let total_minor = capture_minor.saturating_add(deposit_minor);
        if total_minor <= 0 {
            return Err(BookingPaymentError::InvalidRequest(
                "capture total must be positive".to_string(),
            ));
        }
        if total_minor > authorized_minor {
            return Err(BookingPaymentError::InvalidRequest(format!(
                "capture total {:.2} exceeds authorized {:.2}",
                to_major_units(total_minor),
                to_major_units(authorized_minor)
            )));
        }

        let next = if total_minor == authorized_minor {
            PaymentStatus::Confirmed
        } else {
            PaymentStatus::PartiallyCaptured
        };

        let payment_intent_id = Self::payment_intent_id(&booking)?;
        let captured = self
            .payment_gateway
            .capture_payment_intent(payment_intent_id, Some(total_minor))
            .await
            .map_err(|err| {
                error!(%booking_id, total_minor, error = ?err, "payments: capture failed");
                BookingPaymentError::PaymentProvider(err)
            })?;

        let updated = self
            .persist(
                booking_id,
                UpdateBookingEntity {
                    status: Some(BookingStatus::Confirmed.as_str().to_string()),
                    payment_status: Some(next.as_str().to_string()),
                    captured_amount_minor: Some(captured.amount_received_minor),
                    security_deposit_minor: (deposit_minor > 0).then_some(deposit_minor),
                    ..Default::default()
                },
            )
            .await?;

        info!(
            %booking_id,
            total_minor,
            deposit_minor,
            payment_status = %next,
            "payments: pre-authorization captured"
        );

        if let Some(to) = updated.renter_email.clone() {
            let listing_title = self.listing_title(updated.listing_id).await;
            self.email_dispatcher
                .dispatch_best_effort(&EmailNotification::PaymentCaptured {
                    to,
                    renter_name: None,
                    listing_title,
                    amount: to_major_units(capture_minor),
                    security_deposit: (deposit_minor > 0).then(|| to_major_units(deposit_minor)),
                })
                .await;
        }

        Ok(Self::response(&updated, None))
    }

    /// Declines a booking. Provider cleanup is best effort; the booking always ends
    /// cancelled and refunded.
    pub async fn reject_booking(
        &self,
        caller: Caller,
        booking_id: Uuid,
        request: CancelBookingRequest,
    ) -> UseCaseResult<BookingPaymentResponse> {
        self.ensure_admin(caller).await?;
        let booking = self.load_booking(booking_id).await?;
        Self::ensure_transition(&booking, PaymentStatus::Refunded)?;

        let provider_warning = match booking.payment_type() {
            PaymentType::OneTime => match booking.stripe_payment_intent_id.as_deref() {
                Some(payment_intent_id) => self
                    .payment_gateway
                    .cancel_payment_intent(payment_intent_id)
                    .await
                    .err(),
                None => None,
            },
            PaymentType::Recurring => self.cancel_subscription_of(&booking).await,
        }
        .map(|err| {
            warn!(%booking_id, error = ?err, "payments: provider cleanup failed during reject");
            err.to_string()
        });

        let reason = Self::clean_reason(request.reason);
        let updated = self.cancel_and_refund(booking_id, reason.clone()).await?;
        info!(%booking_id, provider_ok = provider_warning.is_none(), "payments: booking rejected");

        if let Some(to) = updated.renter_email.clone() {
            let listing_title = self.listing_title(updated.listing_id).await;
            self.email_dispatcher
                .dispatch_best_effort(&EmailNotification::BookingRejected {
                    to,
                    renter_name: None,
                    listing_title,
                    reason,
                })
                .await;
        }

        Ok(Self::response(&updated, provider_warning))
    }

    /// Returns captured funds, or releases the hold when nothing was captured yet.
    pub async fn refund_payment(
        &self,
        caller: Caller,
        booking_id: Uuid,
        request: CancelBookingRequest,
    ) -> UseCaseResult<BookingPaymentResponse> {
        self.ensure_admin(caller).await?;
        let booking = self.load_booking(booking_id).await?;
        let current = Self::current_payment_status(&booking)?;
        Self::ensure_transition(&booking, PaymentStatus::Refunded)?;

        let provider_warning = match booking.payment_type() {
            PaymentType::OneTime => match booking.stripe_payment_intent_id.as_deref() {
                Some(payment_intent_id) if current.has_captured_funds() => {
                    match self.payment_gateway.refund_payment_intent(payment_intent_id).await {
                        Ok(refund_id) => {
                            info!(%booking_id, %refund_id, "payments: refund issued");
                            None
                        }
                        Err(err) => Some(err),
                    }
                }
                Some(payment_intent_id) => self
                    .payment_gateway
                    .cancel_payment_intent(payment_intent_id)
                    .await
                    .err(),
                None => None,
            },
            PaymentType::Recurring => self.cancel_subscription_of(&booking).await,
        }
        .map(|err| {
            warn!(%booking_id, error = ?err, "payments: provider cleanup failed during refund");
            err.to_string()
        });

        let reason = Self::clean_reason(request.reason);
        let updated = self.cancel_and_refund(booking_id, reason.clone()).await?;
        info!(%booking_id, provider_ok = provider_warning.is_none(), "payments: booking refunded");

        if let Some(to) = updated.renter_email.clone() {
            let listing_title = self.listing_title(updated.listing_id).await;
            self.email_dispatcher
                .dispatch_best_effort(&EmailNotification::PaymentRefunded {
                    to,
                    renter_name: None,
                    listing_title,
                    amount: updated
                        .captured_amount_minor
                        .or(updated.pre_authorization_amount_minor)
                        .map(to_major_units),
                    reason,
                })
                .await;
        }

        Ok(Self::response(&updated, provider_warning))
    }

    async fn cancel_subscription_of(&self, booking: &BookingEntity) -> Option<anyhow::Error> {
        let subscription_id = booking.stripe_subscription_id.as_deref()?;
        self.payment_gateway
            .cancel_subscription(subscription_id)
            .await
            .err()
    }

    async fn cancel_and_refund(
        &self,
        booking_id: Uuid,
        reason: Option<String>,
    ) -> UseCaseResult<BookingEntity> {
        self.persist(
            booking_id,
            UpdateBookingEntity {
                status: Some(BookingStatus::Cancelled.as_str().to_string()),
                payment_status: Some(PaymentStatus::Refunded.as_str().to_string()),
                cancellation_reason: reason,
                ..Default::default()
            },
        )
        .await
    }

    async fn persist(
        &self,
        booking_id: Uuid,
        changes: UpdateBookingEntity,
    ) -> UseCaseResult<BookingEntity> {
        let updated = self
            .booking_repo
            .update_booking(booking_id, changes)
            .await
            .map_err(|err| {
                error!(%booking_id, db_error = ?err, "payments: failed to update booking");
                BookingPaymentError::Internal(err)
            })?;
        self.change_feed.publish(TableChange::ParkingBookings);
        Ok(updated)
    }

    async fn load_booking(&self, booking_id: Uuid) -> UseCaseResult<BookingEntity> {
        self.booking_repo
            .find_by_id(booking_id)
            .await
            .map_err(|err| {
                error!(%booking_id, db_error = ?err, "payments: failed to load booking");
                BookingPaymentError::Internal(err)
            })?
            .ok_or(BookingPaymentError::BookingNotFound)
    }

    async fn listing_title(&self, listing_id: Uuid) -> String {
        match self.listing_repo.find_by_id(listing_id).await {
            Ok(Some(listing)) => listing.title,
            Ok(None) => FALLBACK_LISTING_TITLE.to_string(),
            Err(err) => {
                warn!(%listing_id, db_error = ?err, "payments: listing lookup for email failed");
                FALLBACK_LISTING_TITLE.to_string()
            }
        }
    }

    async fn is_admin(&self, caller: Caller) -> UseCaseResult<bool> {
        if caller.service_role {
            return Ok(true);
        }
        self.user_role_repo
            .is_admin(caller.user_id)
            .await
            .map_err(|err| {
                error!(user_id = %caller.user_id, db_error = ?err, "payments: failed to load roles");
                BookingPaymentError::Internal(err)
            })
    }

    async fn ensure_admin(&self, caller: Caller) -> UseCaseResult<()> {
        if self.is_admin(caller).await? {
            Ok(())
        } else {
            warn!(user_id = %caller.user_id, "payments: admin operation denied");
            Err(BookingPaymentError::Forbidden)
        }
    }

    async fn ensure_renter_or_admin(
        &self,
        caller: Caller,
        booking: &BookingEntity,
    ) -> UseCaseResult<()> {
        if booking.user_id == caller.user_id {
            return Ok(());
        }
        self.ensure_admin(caller).await
    }

    fn current_payment_status(booking: &BookingEntity) -> UseCaseResult<PaymentStatus> {
        booking.payment_status().ok_or_else(|| {
            error!(
                booking_id = %booking.id,
                payment_status = %booking.payment_status,
                "payments: unknown stored payment status"
            );
            BookingPaymentError::Internal(anyhow::anyhow!(
                "unknown payment status {}",
                booking.payment_status
            ))
        })
    }

    fn ensure_transition(booking: &BookingEntity, next: PaymentStatus) -> UseCaseResult<()> {
        let current = Self::current_payment_status(booking)?;
        if current.can_transition_to(next) {
            Ok(())
        } else {
            warn!(
                booking_id = %booking.id,
                from = %current,
                to = %next,
                "payments: illegal payment transition"
            );
            Err(BookingPaymentError::IllegalTransition {
                from: current.as_str().to_string(),
                to: next,
            })
        }
    }

    fn ensure_not_expired(booking: &BookingEntity, now: DateTime<Utc>) -> UseCaseResult<()> {
        match booking.pre_authorization_expires_at {
            Some(expires_at) if now > expires_at => {
                warn!(booking_id = %booking.id, %expires_at, "payments: pre-authorization expired");
                Err(BookingPaymentError::PreAuthorizationExpired(expires_at))
            }
            _ => Ok(()),
        }
    }

    fn payment_intent_id(booking: &BookingEntity) -> UseCaseResult<&str> {
        booking.stripe_payment_intent_id.as_deref().ok_or_else(|| {
            BookingPaymentError::InvalidRequest("booking has no payment intent".to_string())
        })
    }

    fn parse_amount(amount: f64, field: &str) -> UseCaseResult<i64> {
        to_minor_units(amount)
            .ok_or_else(|| BookingPaymentError::InvalidRequest(format!("{field} is invalid")))
    }

    fn requested_amount_minor(request: &CreatePreAuthorizationRequest) -> UseCaseResult<i64> {
        match (request.amount, request.monthly_rate, request.duration) {
            (Some(amount), _, _) => Self::parse_amount(amount, "amount"),
            (None, Some(rate), Some(duration)) if duration >= 1 => {
                Self::parse_amount(pre_authorization_amount(rate, duration), "monthly_rate")
            }
            _ => Err(BookingPaymentError::InvalidRequest(
                "amount or monthly_rate with duration is required".to_string(),
            )),
        }
    }

    /// Amount billed each month once a recurring booking is approved.
    fn recurring_period_amount_minor(
        request: &CreatePreAuthorizationRequest,
        booking: &BookingEntity,
        authorized_minor: i64,
    ) -> UseCaseResult<i64> {
        let per_period = match request.monthly_rate {
            Some(rate) => Self::parse_amount(rate, "monthly_rate")?,
            None => {
                let months = request
                    .duration
                    .unwrap_or(booking.duration_hours)
                    .max(1);
                authorized_minor / i64::from(months)
            }
        };
        Ok(apply_provider_floor(per_period))
    }

    fn clean_reason(reason: Option<String>) -> Option<String> {
        reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
    }

    fn response(booking: &BookingEntity, provider_warning: Option<String>) -> BookingPaymentResponse {
        BookingPaymentResponse {
            success: true,
            booking_id: booking.id,
            status: booking.booking_status().unwrap_or(BookingStatus::PendingReview),
            payment_status: booking.payment_status().unwrap_or(PaymentStatus::Pending),
            captured_amount: booking.captured_amount_minor.map(to_major_units),
            provider_warning,
        }
    }
}
