use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::bookings::BookingEntity,
    value_objects::{
        amounts::to_major_units,
        enums::{
            booking_statuses::BookingStatus, payment_statuses::PaymentStatus,
            payment_types::PaymentType,
        },
    },
};

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitBookingRequest {
    pub listing_id: Uuid,
    pub space_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    /// Number of months booked.
    pub duration: i32,
    pub payment_type: PaymentType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePreAuthorizationRequest {
    pub booking_id: Uuid,
    pub amount: Option<f64>,
    pub monthly_rate: Option<f64>,
    pub duration: Option<i32>,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PreAuthorizationResponse {
    pub success: bool,
    pub booking_id: Uuid,
    pub session_id: String,
    pub checkout_url: Option<String>,
    pub amount: f64,
    pub amount_adjusted: bool,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CapturePreAuthorizationRequest {
    pub capture_amount: Option<f64>,
    pub security_deposit: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingPaymentResponse {
    pub success: bool,
    pub booking_id: Uuid,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub captured_amount: Option<f64>,
    /// Set when a provider call failed but the booking was still moved to its final state.
    pub provider_warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingDto {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub space_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
    pub payment_status: String,
    pub payment_type: String,
    pub total_amount: f64,
    pub pre_authorization_expires_at: Option<DateTime<Utc>>,
    pub confirmation_deadline: Option<DateTime<Utc>>,
}

impl From<BookingEntity> for BookingDto {
    fn from(value: BookingEntity) -> Self {
        Self {
            id: value.id,
            listing_id: value.listing_id,
            space_id: value.space_id,
            start_time: value.start_time,
            end_time: value.end_time,
            status: value.status,
            payment_status: value.payment_status,
            payment_type: value.payment_type,
            total_amount: to_major_units(value.total_amount_minor),
            pre_authorization_expires_at: value.pre_authorization_expires_at,
            confirmation_deadline: value.confirmation_deadline,
        }
    }
}

/// End of a recurring booking's minimum commitment.
///
/// `duration_hours` on recurring bookings holds the number of committed months.
pub fn commitment_end(start_time: DateTime<Utc>, duration_hours: i32) -> Option<DateTime<Utc>> {
    let months = u32::try_from(duration_hours).ok()?;
    start_time.checked_add_months(Months::new(months))
}
