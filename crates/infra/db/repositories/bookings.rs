use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::parking_bookings},
};
use domain::{
    entities::bookings::{BookingEntity, InsertBookingEntity, UpdateBookingEntity},
    repositories::bookings::BookingRepository,
    value_objects::enums::{
        booking_statuses::BookingStatus, payment_statuses::PaymentStatus,
        payment_types::PaymentType,
    },
};

pub struct BookingPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl BookingPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl BookingRepository for BookingPostgres {
    async fn create_booking(
        &self,
        insert_booking_entity: InsertBookingEntity,
    ) -> Result<BookingEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(parking_bookings::table)
            .values(&insert_booking_entity)
            .returning(BookingEntity::as_returning())
            .get_result::<BookingEntity>(&mut conn)?;

        Ok(result)
    }

    async fn find_by_id(&self, booking_id: Uuid) -> Result<Option<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = parking_bookings::table
            .filter(parking_bookings::id.eq(booking_id))
            .select(BookingEntity::as_select())
            .first::<BookingEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_stripe_session_id(&self, session_id: &str) -> Result<Option<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = parking_bookings::table
            .filter(parking_bookings::stripe_session_id.eq(session_id))
            .select(BookingEntity::as_select())
            .first::<BookingEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_stripe_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = parking_bookings::table
            .filter(parking_bookings::stripe_subscription_id.eq(subscription_id))
            .select(BookingEntity::as_select())
            .first::<BookingEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn update_booking(
        &self,
        booking_id: Uuid,
        changes: UpdateBookingEntity,
    ) -> Result<BookingEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let changes = UpdateBookingEntity {
            updated_at: Some(changes.updated_at.unwrap_or_else(Utc::now)),
            ..changes
        };

        let result = update(parking_bookings::table)
            .filter(parking_bookings::id.eq(booking_id))
            .set(&changes)
            .returning(BookingEntity::as_returning())
            .get_result::<BookingEntity>(&mut conn)?;

        Ok(result)
    }

    async fn list_recurring_in_commitment(&self) -> Result<Vec<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = parking_bookings::table
            .filter(parking_bookings::payment_type.eq(PaymentType::Recurring.as_str()))
            .filter(parking_bookings::status.eq(BookingStatus::Confirmed.as_str()))
            .filter(parking_bookings::payment_status.eq_any([
                PaymentStatus::Confirmed.as_str(),
                PaymentStatus::Paid.as_str(),
            ]))
            .filter(parking_bookings::stripe_subscription_id.is_not_null())
            .order(parking_bookings::start_time.asc())
            .select(BookingEntity::as_select())
            .load::<BookingEntity>(&mut conn)?;

        Ok(results)
    }

    async fn list_active_for_listings(
        &self,
        listing_ids: Vec<Uuid>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = parking_bookings::table
            .filter(parking_bookings::listing_id.eq_any(listing_ids))
            .filter(parking_bookings::status.eq_any([
                BookingStatus::PendingReview.as_str(),
                BookingStatus::Confirmed.as_str(),
            ]))
            .filter(parking_bookings::start_time.le(window_end))
            .filter(parking_bookings::end_time.ge(window_start))
            .select(BookingEntity::as_select())
            .load::<BookingEntity>(&mut conn)?;

        Ok(results)
    }
}
