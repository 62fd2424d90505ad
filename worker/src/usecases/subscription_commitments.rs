use anyhow::Result;
use chrono::{DateTime, Utc};
use parkbay::{
    domain::{
        entities::bookings::{BookingEntity, UpdateBookingEntity},
        repositories::{
            bookings::BookingRepository, email_gateway::EmailGateway,
            listings::ListingRepository, payment_gateway::PaymentGateway,
        },
        value_objects::{
            bookings::commitment_end,
            enums::booking_statuses::BookingStatus,
            notifications::EmailNotification,
        },
    },
    notifications::templates::{self, TemplateSettings},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

const MAX_REPORTED_IDS: usize = 20;

#[derive(Debug, Clone, Copy, Default)]
pub struct CommitmentSweepParams {
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitmentSweepResult {
    pub scanned: usize,
    pub due: usize,
    pub cancelled: usize,
    pub failed: usize,
    pub skipped: usize,
    pub due_ids: Vec<Uuid>,
    pub cancelled_ids: Vec<Uuid>,
    pub failed_ids: Vec<Uuid>,
}

fn push_sample(ids: &mut Vec<Uuid>, id: Uuid) {
    if ids.len() < MAX_REPORTED_IDS {
        ids.push(id);
    }
}

/// Ends recurring bookings whose minimum commitment has passed.
pub struct SubscriptionCommitmentUseCase {
    booking_repository: Arc<dyn BookingRepository + Send + Sync>,
    listing_repository: Arc<dyn ListingRepository + Send + Sync>,
    payment_gateway: Arc<dyn PaymentGateway + Send + Sync>,
    email_gateway: Arc<dyn EmailGateway + Send + Sync>,
    template_settings: TemplateSettings,
}

impl SubscriptionCommitmentUseCase {
    pub fn new(
        booking_repository: Arc<dyn BookingRepository + Send + Sync>,
        listing_repository: Arc<dyn ListingRepository + Send + Sync>,
        payment_gateway: Arc<dyn PaymentGateway + Send + Sync>,
        email_gateway: Arc<dyn EmailGateway + Send + Sync>,
        template_settings: TemplateSettings,
    ) -> Self {
        Self {
            booking_repository,
            listing_repository,
            payment_gateway,
            email_gateway,
            template_settings,
        }
    }

    pub async fn run(&self, params: CommitmentSweepParams) -> Result<CommitmentSweepResult> {
        self.run_at(params, Utc::now()).await
    }

    pub async fn run_at(
        &self,
        params: CommitmentSweepParams,
        now: DateTime<Utc>,
    ) -> Result<CommitmentSweepResult> {
        let bookings = self
            .booking_repository
            .list_recurring_in_commitment()
            .await?;

        let mut result = CommitmentSweepResult {
            scanned: bookings.len(),
            ..Default::default()
        };

        for booking in bookings {
            let Some(subscription_id) = booking.stripe_subscription_id.clone() else {
                result.skipped += 1;
                continue;
            };
            let Some(ends_at) = commitment_end(booking.start_time, booking.duration_hours) else {
                warn!(
                    booking_id = %booking.id,
                    duration_hours = booking.duration_hours,
                    "commitment_sweep: booking has no valid commitment end; skipping"
                );
                result.skipped += 1;
                continue;
            };

            if ends_at > now {
                continue;
            }

            result.due += 1;
            push_sample(&mut result.due_ids, booking.id);

            if params.dry_run {
                continue;
            }

            if let Err(err) = self.payment_gateway.cancel_subscription(&subscription_id).await {
                error!(
                    booking_id = %booking.id,
                    %subscription_id,
                    error = ?err,
                    "commitment_sweep: failed to cancel subscription; retrying next sweep"
                );
                result.failed += 1;
                push_sample(&mut result.failed_ids, booking.id);
                continue;
            }

            let changes = UpdateBookingEntity {
                status: Some(BookingStatus::Completed.as_str().to_string()),
                ..Default::default()
            };
            match self
                .booking_repository
                .update_booking(booking.id, changes)
                .await
            {
                Ok(updated) => {
                    info!(
                        booking_id = %updated.id,
                        %subscription_id,
                        %ends_at,
                        "commitment_sweep: subscription completed"
                    );
                    result.cancelled += 1;
                    push_sample(&mut result.cancelled_ids, updated.id);
                    self.notify_completed(&updated, ends_at).await;
                }
                Err(err) => {
                    error!(
                        booking_id = %booking.id,
                        db_error = ?err,
                        "commitment_sweep: subscription cancelled but booking update failed"
                    );
                    result.failed += 1;
                    push_sample(&mut result.failed_ids, booking.id);
                }
            }
        }

        info!(
            scanned = result.scanned,
            due = result.due,
            cancelled = result.cancelled,
            failed = result.failed,
            skipped = result.skipped,
            dry_run = params.dry_run,
            "commitment_sweep: finished"
        );

        Ok(result)
    }

    async fn notify_completed(&self, booking: &BookingEntity, ended_at: DateTime<Utc>) {
        let Some(to) = booking.renter_email.clone() else {
            return;
        };
        let listing_title = match self.listing_repository.find_by_id(booking.listing_id).await {
            Ok(Some(listing)) => listing.title,
            _ => "your parking space".to_string(),
        };

        let notification = EmailNotification::SubscriptionCompleted {
            to,
            renter_name: None,
            listing_title,
            ended_at,
        };
        let email = match templates::render(&notification, &self.template_settings) {
            Ok(email) => email,
            Err(err) => {
                warn!(booking_id = %booking.id, error = %err, "commitment_sweep: email not rendered");
                return;
            }
        };
        if let Err(err) = self.email_gateway.send(email).await {
            warn!(
                booking_id = %booking.id,
                error = ?err,
                "commitment_sweep: completion email failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use parkbay::domain::{
        entities::listings::ListingEntity,
        repositories::{
            bookings::MockBookingRepository, email_gateway::MockEmailGateway,
            listings::MockListingRepository, payment_gateway::MockPaymentGateway,
        },
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn recurring(months: i32, started_days_ago: i64, subscription: Option<&str>) -> BookingEntity {
        let start_time = now() - Duration::days(started_days_ago);
        BookingEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            listing_id: Uuid::new_v4(),
            space_id: None,
            start_time,
            end_time: start_time + Duration::days(30 * i64::from(months)),
            duration_hours: months,
            status: "confirmed".into(),
            payment_status: "paid".into(),
            payment_type: "recurring".into(),
            total_amount_minor: 150_000,
            renter_email: Some("renter@example.com".into()),
            stripe_customer_id: Some("cus_1".into()),
            stripe_session_id: Some("cs_1".into()),
            stripe_payment_intent_id: None,
            stripe_subscription_id: subscription.map(str::to_string),
            pre_authorization_amount_minor: Some(150_000),
            captured_amount_minor: None,
            security_deposit_minor: None,
            pre_authorization_expires_at: None,
            confirmation_deadline: None,
            cancellation_reason: None,
            created_at: start_time,
            updated_at: start_time,
        }
    }

    fn settings() -> TemplateSettings {
        TemplateSettings {
            from: "Parkbay <noreply@parkbay.test>".into(),
            admin_email: "admin@parkbay.test".into(),
            frontend_url: "https://parkbay.test".into(),
            currency: "gbp".into(),
        }
    }

    fn listings() -> MockListingRepository {
        let mut listings = MockListingRepository::new();
        listings.expect_find_by_id().returning(|id| {
            Ok(Some(ListingEntity {
                id,
                owner_id: Uuid::new_v4(),
                title: "Covered bay".into(),
                address: "1 Station Road".into(),
                price_per_month_minor: 50_000,
                status: "approved".into(),
                is_active: true,
                created_at: now(),
                updated_at: now(),
            }))
        });
        listings
    }

    fn usecase(
        bookings: MockBookingRepository,
        gateway: MockPaymentGateway,
        email: MockEmailGateway,
    ) -> SubscriptionCommitmentUseCase {
        SubscriptionCommitmentUseCase::new(
            Arc::new(bookings),
            Arc::new(listings()),
            Arc::new(gateway),
            Arc::new(email),
            settings(),
        )
    }

    #[tokio::test]
    async fn due_subscriptions_are_cancelled_and_completed() {
        let due = recurring(3, 120, Some("sub_due"));
        let running = recurring(3, 10, Some("sub_running"));
        let due_id = due.id;

        let mut bookings = MockBookingRepository::new();
        let rows = vec![due.clone(), running];
        bookings
            .expect_list_recurring_in_commitment()
            .returning(move || Ok(rows.clone()));
        bookings
            .expect_update_booking()
            .withf(move |id, changes| *id == due_id && changes.status.as_deref() == Some("completed"))
            .times(1)
            .returning(move |_, _| {
                let mut row = due.clone();
                row.status = "completed".into();
                Ok(row)
            });

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_cancel_subscription()
            .withf(|id: &str| id == "sub_due")
            .times(1)
            .returning(|_| Ok(()));

        let mut email = MockEmailGateway::new();
        email
            .expect_send()
            .withf(|email| email.to == vec!["renter@example.com".to_string()])
            .times(1)
            .returning(|_| Ok("msg_1".into()));

        let result = usecase(bookings, gateway, email)
            .run_at(CommitmentSweepParams::default(), now())
            .await
            .unwrap();

        assert_eq!(result.scanned, 2);
        assert_eq!(result.due, 1);
        assert_eq!(result.cancelled, 1);
        assert_eq!(result.cancelled_ids, vec![due_id]);
        assert_eq!(result.failed, 0);
    }

    #[tokio::test]
    async fn dry_run_reports_without_cancelling() {
        let due = recurring(1, 60, Some("sub_due"));
        let due_id = due.id;

        let mut bookings = MockBookingRepository::new();
        bookings
            .expect_list_recurring_in_commitment()
            .returning(move || Ok(vec![due.clone()]));
        bookings.expect_update_booking().never();

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_cancel_subscription().never();

        let result = usecase(bookings, gateway, MockEmailGateway::new())
            .run_at(CommitmentSweepParams { dry_run: true }, now())
            .await
            .unwrap();

        assert_eq!(result.due, 1);
        assert_eq!(result.due_ids, vec![due_id]);
        assert_eq!(result.cancelled, 0);
    }

    #[tokio::test]
    async fn provider_failure_leaves_booking_for_next_sweep() {
        let due = recurring(1, 60, Some("sub_due"));
        let due_id = due.id;

        let mut bookings = MockBookingRepository::new();
        bookings
            .expect_list_recurring_in_commitment()
            .returning(move || Ok(vec![due.clone()]));
        bookings.expect_update_booking().never();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_cancel_subscription()
            .returning(|_| Err(anyhow::anyhow!("stripe unavailable")));

        let result = usecase(bookings, gateway, MockEmailGateway::new())
            .run_at(CommitmentSweepParams::default(), now())
            .await
            .unwrap();

        assert_eq!(result.failed, 1);
        assert_eq!(result.failed_ids, vec![due_id]);
        assert_eq!(result.cancelled, 0);
    }

    #[tokio::test]
    async fn bookings_without_subscription_are_skipped() {
        let orphan = recurring(1, 60, None);

        let mut bookings = MockBookingRepository::new();
        bookings
            .expect_list_recurring_in_commitment()
            .returning(move || Ok(vec![orphan.clone()]));

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_cancel_subscription().never();

        let result = usecase(bookings, gateway, MockEmailGateway::new())
            .run_at(CommitmentSweepParams::default(), now())
            .await
            .unwrap();

        assert_eq!(result.skipped, 1);
        assert_eq!(result.due, 0);
    }
}
