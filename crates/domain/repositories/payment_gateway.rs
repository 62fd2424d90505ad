use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::enums::payment_types::PaymentType;

#[derive(Debug, Clone, PartialEq)]
pub struct PreAuthorizationSessionRequest {
    pub booking_id: Uuid,
    pub customer_id: String,
    pub payment_type: PaymentType,
    pub amount_minor: i64,
    pub description: String,
    /// Recurring bookings trial until this instant so nothing is billed before approval.
    pub hold_until: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub payment_intent_id: Option<String>,
    pub subscription_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapturedPayment {
    pub payment_intent_id: String,
    pub amount_received_minor: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentWebhookEvent {
    pub id: Option<String>,
    pub event_type: String,
    pub object: serde_json::Value,
}

#[automock]
#[async_trait]
pub trait PaymentGateway {
    async fn create_pre_authorization_session(
        &self,
        request: PreAuthorizationSessionRequest,
    ) -> Result<CheckoutSession>;

    /// Captures `amount_to_capture_minor`, or the full authorized amount when `None`.
    async fn capture_payment_intent(
        &self,
        payment_intent_id: &str,
        amount_to_capture_minor: Option<i64>,
    ) -> Result<CapturedPayment>;

    async fn cancel_payment_intent(&self, payment_intent_id: &str) -> Result<()>;

    /// Refunds everything captured on the intent and returns the refund id.
    async fn refund_payment_intent(&self, payment_intent_id: &str) -> Result<String>;

    async fn end_subscription_trial(&self, subscription_id: &str) -> Result<()>;

    /// Cancels the subscription immediately. One that is already cancelled or
    /// no longer exists counts as cancelled.
    async fn cancel_subscription(&self, subscription_id: &str) -> Result<()>;

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<PaymentWebhookEvent>;
}
