use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{
    repositories::payment_gateway::{
        CapturedPayment, CheckoutSession, PaymentGateway, PaymentWebhookEvent,
        PreAuthorizationSessionRequest,
    },
    value_objects::enums::payment_types::PaymentType,
};

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API: &str = "https://api.stripe.com/v1";
/// Signed webhook payloads older than this are rejected.
const WEBHOOK_TOLERANCE_SECS: u64 = 300;

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    currency: String,
    success_url: String,
    cancel_url: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
    decline_code: Option<String>,
}

/// Non-2xx answer from the Stripe API, kept typed so callers can inspect it.
#[derive(Debug, Error)]
#[error("Stripe API request failed: {context} (status {status}, request_id={request_id:?}): {message}")]
pub struct StripeApiError {
    pub context: String,
    pub status: u16,
    pub request_id: Option<String>,
    pub code: Option<String>,
    pub message: String,
}

impl StripeApiError {
    /// The subscription was already cancelled or no longer exists.
    pub fn is_subscription_gone(&self) -> bool {
        self.status == 404
            || self.code.as_deref() == Some("resource_missing")
            || self.message.to_ascii_lowercase().contains("canceled subscription")
    }
}

#[derive(Debug, Deserialize)]
struct StripeCheckoutSessionResp {
    id: String,
    url: Option<String>,
    payment_intent: Option<String>,
    subscription: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntentResp {
    id: String,
    amount_received: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripeIdResp {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeListResp<T> {
    data: Vec<T>,
}

impl StripeClient {
    pub fn new(
        secret_key: String,
        webhook_secret: String,
        currency: String,
        success_url: String,
        cancel_url: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret,
            currency,
            success_url,
            cancel_url,
        }
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.clone()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.clone()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.clone()),
            stripe_decline_code = ?details.as_ref().and_then(|d| d.decline_code.clone()),
            response_body = %body,
            context = %context,
            "stripe api request failed"
        );

        let (code, message) = match details {
            Some(d) => (d.code, d.message),
            None => (None, None),
        };

        Err(StripeApiError {
            context: context.to_string(),
            status: status.as_u16(),
            request_id,
            code,
            message: message.unwrap_or_else(|| "no error message".to_string()),
        }
        .into())
    }

    async fn post_form(
        &self,
        path: &str,
        body: &[(String, String)],
        context: &str,
    ) -> Result<reqwest::Response> {
        let resp = self
            .http
            .post(format!("{STRIPE_API}{path}"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(body)
            .send()
            .await?;
        Self::ensure_success(resp, context).await
    }

    /// Looks up an existing customer by email. https://stripe.com/docs/api/customers/list
    pub async fn find_customer_by_email(&self, email: &str) -> Result<Option<String>> {
        let resp = self
            .http
            .get(format!("{STRIPE_API}/customers"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .query(&[("email", email), ("limit", "1")])
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "list customers").await?;

        let parsed: StripeListResp<StripeIdResp> = resp.json().await?;
        Ok(parsed.data.into_iter().next().map(|customer| customer.id))
    }

    /// https://stripe.com/docs/api/customers/create
    pub async fn create_customer(&self, email: &str, user_id: Uuid) -> Result<String> {
        let body = vec![
            ("email".to_string(), email.to_string()),
            ("metadata[user_id]".to_string(), user_id.to_string()),
        ];

        let resp = self.post_form("/customers", &body, "create customer").await?;
        let parsed: StripeIdResp = resp.json().await?;
        Ok(parsed.id)
    }

    fn checkout_form(&self, request: &PreAuthorizationSessionRequest) -> Vec<(String, String)> {
        let booking_id = request.booking_id.to_string();
        let mut body: Vec<(String, String)> = vec![
            ("customer".to_string(), request.customer_id.clone()),
            (
                "success_url".to_string(),
                format!(
                    "{}?booking_id={}&session_id={{CHECKOUT_SESSION_ID}}",
                    self.success_url, booking_id
                ),
            ),
            (
                "cancel_url".to_string(),
                format!("{}?booking_id={}", self.cancel_url, booking_id),
            ),
            ("metadata[booking_id]".to_string(), booking_id.clone()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                self.currency.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                request.amount_minor.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                request.description.clone(),
            ),
        ];

        match request.payment_type {
            // Manual capture holds the funds until an admin approves the booking.
            PaymentType::OneTime => {
                body.push(("mode".to_string(), "payment".to_string()));
                body.push((
                    "payment_intent_data[capture_method]".to_string(),
                    "manual".to_string(),
                ));
                body.push((
                    "payment_intent_data[metadata][booking_id]".to_string(),
                    booking_id,
                ));
            }
            PaymentType::Recurring => {
                body.push(("mode".to_string(), "subscription".to_string()));
                body.push((
                    "line_items[0][price_data][recurring][interval]".to_string(),
                    "month".to_string(),
                ));
                body.push((
                    "subscription_data[trial_end]".to_string(),
                    request.hold_until.timestamp().to_string(),
                ));
                body.push((
                    "subscription_data[metadata][booking_id]".to_string(),
                    booking_id,
                ));
            }
        }

        body
    }

    /// https://stripe.com/docs/api/checkout/sessions/create
    pub async fn create_checkout_session(
        &self,
        request: &PreAuthorizationSessionRequest,
    ) -> Result<CheckoutSession> {
        let body = self.checkout_form(request);
        let resp = self
            .post_form("/checkout/sessions", &body, "create checkout session")
            .await?;

        let parsed: StripeCheckoutSessionResp = resp.json().await?;
        Ok(CheckoutSession {
            id: parsed.id,
            url: parsed.url,
            payment_intent_id: parsed.payment_intent,
            subscription_id: parsed.subscription,
        })
    }

    /// https://stripe.com/docs/api/payment_intents/capture
    pub async fn capture_payment_intent(
        &self,
        payment_intent_id: &str,
        amount_to_capture_minor: Option<i64>,
    ) -> Result<CapturedPayment> {
        let mut body = Vec::new();
        if let Some(amount) = amount_to_capture_minor {
            body.push(("amount_to_capture".to_string(), amount.to_string()));
        }

        let resp = self
            .post_form(
                &format!("/payment_intents/{payment_intent_id}/capture"),
                &body,
                "capture payment intent",
            )
            .await?;

        let parsed: StripePaymentIntentResp = resp.json().await?;
        Ok(CapturedPayment {
            payment_intent_id: parsed.id,
            amount_received_minor: parsed.amount_received.unwrap_or_default(),
        })
    }

    /// Releases an uncaptured authorization. https://stripe.com/docs/api/payment_intents/cancel
    pub async fn cancel_payment_intent(&self, payment_intent_id: &str) -> Result<()> {
        self.post_form(
            &format!("/payment_intents/{payment_intent_id}/cancel"),
            &[],
            "cancel payment intent",
        )
        .await?;
        Ok(())
    }

    /// https://stripe.com/docs/api/refunds/create
    pub async fn refund_payment_intent(&self, payment_intent_id: &str) -> Result<String> {
        let body = vec![(
            "payment_intent".to_string(),
            payment_intent_id.to_string(),
        )];
        let resp = self.post_form("/refunds", &body, "create refund").await?;

        let parsed: StripeIdResp = resp.json().await?;
        Ok(parsed.id)
    }

    /// Ends the trial so the first invoice is raised now.
    /// https://stripe.com/docs/billing/subscriptions/trials#changing
    pub async fn end_subscription_trial(&self, subscription_id: &str) -> Result<()> {
        let body = vec![("trial_end".to_string(), "now".to_string())];
        self.post_form(
            &format!("/subscriptions/{subscription_id}"),
            &body,
            "end subscription trial",
        )
        .await?;
        Ok(())
    }

    /// A subscription that is already cancelled or gone counts as cancelled.
    /// https://stripe.com/docs/api/subscriptions/cancel
    pub async fn cancel_subscription(&self, subscription_id: &str) -> Result<()> {
        let resp = self
            .http
            .delete(format!("{STRIPE_API}/subscriptions/{subscription_id}"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;

        match Self::ensure_success(resp, "cancel subscription").await {
            Ok(_) => Ok(()),
            Err(err) if subscription_already_gone(&err) => {
                info!(%subscription_id, "stripe subscription was already cancelled");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Verifies the webhook signature. https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent> {
        verify_signed_payload(
            &self.webhook_secret,
            payload,
            signature_header,
            Utc::now().timestamp(),
        )?;

        let event: StripeEvent = serde_json::from_slice(payload)?;
        Ok(event)
    }
}

fn subscription_already_gone(err: &anyhow::Error) -> bool {
    err.downcast_ref::<StripeApiError>()
        .is_some_and(StripeApiError::is_subscription_gone)
}

fn verify_signed_payload(
    secret: &str,
    payload: &[u8],
    signature_header: &str,
    now_ts: i64,
) -> Result<()> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("t=") {
            timestamp = Some(rest);
        } else if let Some(rest) = part.strip_prefix("v1=") {
            signatures.push(rest);
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| anyhow::anyhow!("missing timestamp in stripe-signature"))?;
    if signatures.is_empty() {
        anyhow::bail!("missing v1 in stripe-signature");
    }

    let signed_at: i64 = timestamp.parse()?;
    if now_ts.abs_diff(signed_at) > WEBHOOK_TOLERANCE_SECS {
        anyhow::bail!("stripe-signature timestamp outside tolerance");
    }

    let mut signed_payload = Vec::with_capacity(timestamp.len() + 1 + payload.len());
    signed_payload.extend_from_slice(timestamp.as_bytes());
    signed_payload.push(b'.');
    signed_payload.extend_from_slice(payload);

    for signature in signatures {
        let Ok(provided) = hex::decode(signature) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
        mac.update(&signed_payload);
        if mac.verify_slice(&provided).is_ok() {
            return Ok(());
        }
    }

    anyhow::bail!("invalid webhook signature");
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_pre_authorization_session(
        &self,
        request: PreAuthorizationSessionRequest,
    ) -> Result<CheckoutSession> {
        self.create_checkout_session(&request).await
    }

    async fn capture_payment_intent(
        &self,
        payment_intent_id: &str,
        amount_to_capture_minor: Option<i64>,
    ) -> Result<CapturedPayment> {
        self.capture_payment_intent(payment_intent_id, amount_to_capture_minor)
            .await
    }

    async fn cancel_payment_intent(&self, payment_intent_id: &str) -> Result<()> {
        self.cancel_payment_intent(payment_intent_id).await
    }

    async fn refund_payment_intent(&self, payment_intent_id: &str) -> Result<String> {
        self.refund_payment_intent(payment_intent_id).await
    }

    async fn end_subscription_trial(&self, subscription_id: &str) -> Result<()> {
        self.end_subscription_trial(subscription_id).await
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<()> {
        self.cancel_subscription(subscription_id).await
    }

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<PaymentWebhookEvent> {
        let event = self.verify_webhook_signature(payload, signature)?;
        Ok(PaymentWebhookEvent {
            id: event.id,
            event_type: event.type_,
            object: event.data.object,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "whsec_test_secret";

    fn sign(payload: &[u8], timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    fn client() -> StripeClient {
        StripeClient::new(
            "sk_test".into(),
            SECRET.into(),
            "gbp".into(),
            "https://parkbay.test/booking/success".into(),
            "https://parkbay.test/booking/cancelled".into(),
        )
    }

    #[test]
    fn valid_signature_is_accepted() {
        let payload = br#"{"type":"checkout.session.completed","data":{"object":{}}}"#;
        let header = format!("t=1700000000,v1={}", sign(payload, 1_700_000_000));

        assert!(verify_signed_payload(SECRET, payload, &header, 1_700_000_010).is_ok());
    }

    #[test]
    fn any_matching_v1_signature_is_accepted() {
        let payload = b"{}";
        let header = format!(
            "t=1700000000,v1=deadbeef,v1={}",
            sign(payload, 1_700_000_000)
        );

        assert!(verify_signed_payload(SECRET, payload, &header, 1_700_000_000).is_ok());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let header = format!("t=1700000000,v1={}", sign(b"{}", 1_700_000_000));
        assert!(verify_signed_payload(SECRET, b"{\"x\":1}", &header, 1_700_000_000).is_err());
    }

    #[test]
    fn stale_signature_is_rejected() {
        let payload = b"{}";
        let header = format!("t=1700000000,v1={}", sign(payload, 1_700_000_000));
        assert!(verify_signed_payload(SECRET, payload, &header, 1_700_000_000 + 301).is_err());
    }

    #[test]
    fn extreme_timestamps_are_rejected_without_overflow() {
        for timestamp in [i64::MIN, i64::MAX] {
            let header = format!("t={timestamp},v1=00");
            assert!(verify_signed_payload(SECRET, b"{}", &header, 1_700_000_000).is_err());
        }
        let header = "t=-9223372036854775808,v1=00";
        assert!(verify_signed_payload(SECRET, b"{}", header, i64::MAX).is_err());
    }

    fn api_error(status: u16, code: Option<&str>, message: &str) -> anyhow::Error {
        StripeApiError {
            context: "cancel subscription".into(),
            status,
            request_id: None,
            code: code.map(str::to_string),
            message: message.into(),
        }
        .into()
    }

    #[test]
    fn missing_or_cancelled_subscription_counts_as_cancelled() {
        assert!(subscription_already_gone(&api_error(
            404,
            Some("resource_missing"),
            "No such subscription: 'sub_1'"
        )));
        assert!(subscription_already_gone(&api_error(
            400,
            None,
            "A canceled subscription can only update its cancellation_details and metadata."
        )));
    }

    #[test]
    fn other_cancel_failures_are_still_errors() {
        assert!(!subscription_already_gone(&api_error(500, None, "internal error")));
        assert!(!subscription_already_gone(&anyhow::anyhow!("connection reset")));
    }

    #[test]
    fn header_without_parts_is_rejected() {
        assert!(verify_signed_payload(SECRET, b"{}", "v1=abc", 0).is_err());
        assert!(verify_signed_payload(SECRET, b"{}", "t=0", 0).is_err());
    }

    #[test]
    fn one_time_checkout_uses_manual_capture() {
        let request = PreAuthorizationSessionRequest {
            booking_id: Uuid::nil(),
            customer_id: "cus_123".into(),
            payment_type: PaymentType::OneTime,
            amount_minor: 150_000,
            description: "Parking booking".into(),
            hold_until: Utc.with_ymd_and_hms(2025, 3, 8, 0, 0, 0).unwrap(),
        };

        let form = client().checkout_form(&request);
        assert!(form.contains(&("mode".into(), "payment".into())));
        assert!(form.contains(&(
            "payment_intent_data[capture_method]".into(),
            "manual".into()
        )));
        assert!(form.contains(&(
            "line_items[0][price_data][unit_amount]".into(),
            "150000".into()
        )));
        assert!(!form.iter().any(|(k, _)| k.starts_with("subscription_data")));
    }

    #[test]
    fn recurring_checkout_trials_until_hold_expiry() {
        let hold_until = Utc.with_ymd_and_hms(2025, 3, 8, 0, 0, 0).unwrap();
        let request = PreAuthorizationSessionRequest {
            booking_id: Uuid::nil(),
            customer_id: "cus_123".into(),
            payment_type: PaymentType::Recurring,
            amount_minor: 50_000,
            description: "Parking booking".into(),
            hold_until,
        };

        let form = client().checkout_form(&request);
        assert!(form.contains(&("mode".into(), "subscription".into())));
        assert!(form.contains(&(
            "subscription_data[trial_end]".into(),
            hold_until.timestamp().to_string()
        )));
        assert!(form.contains(&(
            "line_items[0][price_data][recurring][interval]".into(),
            "month".into()
        )));
    }
}
