use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::bookings::{BookingEntity, InsertBookingEntity, UpdateBookingEntity};

#[automock]
#[async_trait]
pub trait BookingRepository {
    async fn create_booking(&self, insert_booking_entity: InsertBookingEntity)
    -> Result<BookingEntity>;

    async fn find_by_id(&self, booking_id: Uuid) -> Result<Option<BookingEntity>>;

    async fn find_by_stripe_session_id(&self, session_id: &str) -> Result<Option<BookingEntity>>;

    async fn find_by_stripe_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<BookingEntity>>;

    async fn update_booking(
        &self,
        booking_id: Uuid,
        changes: UpdateBookingEntity,
    ) -> Result<BookingEntity>;

    /// Recurring bookings still inside (or just past) their commitment period.
    async fn list_recurring_in_commitment(&self) -> Result<Vec<BookingEntity>>;

    async fn list_active_for_listings(
        &self,
        listing_ids: Vec<Uuid>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<BookingEntity>>;
}
