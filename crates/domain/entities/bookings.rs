use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::value_objects::enums::{
    booking_statuses::BookingStatus, payment_statuses::PaymentStatus,
    payment_types::PaymentType,
};
use crate::infra::db::postgres::schema::parking_bookings;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = parking_bookings)]
pub struct BookingEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub listing_id: Uuid,
    pub space_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_hours: i32,
    pub status: String,
    pub payment_status: String,
    pub payment_type: String,
    pub total_amount_minor: i64,
    pub renter_email: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub stripe_session_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub pre_authorization_amount_minor: Option<i64>,
    pub captured_amount_minor: Option<i64>,
    pub security_deposit_minor: Option<i64>,
    pub pre_authorization_expires_at: Option<DateTime<Utc>>,
    pub confirmation_deadline: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingEntity {
    pub fn booking_status(&self) -> Option<BookingStatus> {
        BookingStatus::from_str(&self.status)
    }

    pub fn payment_status(&self) -> Option<PaymentStatus> {
        PaymentStatus::from_str(&self.payment_status)
    }

    /// Unknown values are treated as one-time, which never touches a subscription.
    pub fn payment_type(&self) -> PaymentType {
        PaymentType::from_str(&self.payment_type).unwrap_or(PaymentType::OneTime)
    }

    pub fn overlaps(&self, window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> bool {
        self.start_time <= window_end && window_start <= self.end_time
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = parking_bookings)]
pub struct InsertBookingEntity {
    pub user_id: Uuid,
    pub listing_id: Uuid,
    pub space_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_hours: i32,
    pub status: String,
    pub payment_status: String,
    pub payment_type: String,
    pub total_amount_minor: i64,
    pub renter_email: Option<String>,
}

/// Partial update of a booking row; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = parking_bookings)]
pub struct UpdateBookingEntity {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub renter_email: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub stripe_session_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub pre_authorization_amount_minor: Option<i64>,
    pub captured_amount_minor: Option<i64>,
    pub security_deposit_minor: Option<i64>,
    pub pre_authorization_expires_at: Option<DateTime<Utc>>,
    pub confirmation_deadline: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}
