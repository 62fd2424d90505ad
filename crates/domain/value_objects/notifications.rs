use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A transactional email request. The `kind` field selects the template; the rest of the
/// payload is that template's context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmailNotification {
    BookingReceived {
        to: String,
        renter_name: Option<String>,
        listing_title: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        amount: f64,
    },
    AdminNewBooking {
        booking_id: Uuid,
        listing_title: String,
        renter_email: String,
        start_time: DateTime<Utc>,
        amount: f64,
        payment_type: String,
    },
    BookingConfirmed {
        to: String,
        renter_name: Option<String>,
        listing_title: String,
        address: Option<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        amount: f64,
    },
    OwnerBookingConfirmed {
        to: String,
        owner_name: Option<String>,
        listing_title: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        amount: f64,
    },
    BookingRejected {
        to: String,
        renter_name: Option<String>,
        listing_title: String,
        reason: Option<String>,
    },
    PaymentRefunded {
        to: String,
        renter_name: Option<String>,
        listing_title: String,
        amount: Option<f64>,
        reason: Option<String>,
    },
    PaymentCaptured {
        to: String,
        renter_name: Option<String>,
        listing_title: String,
        amount: f64,
        security_deposit: Option<f64>,
    },
    SubscriptionCompleted {
        to: String,
        renter_name: Option<String>,
        listing_title: String,
        ended_at: DateTime<Utc>,
    },
    ListingSubmitted {
        listing_id: Uuid,
        owner_email: String,
        listing_title: String,
        address: String,
    },
    ListingApproved {
        to: String,
        owner_name: Option<String>,
        listing_title: String,
    },
    ListingRejected {
        to: String,
        owner_name: Option<String>,
        listing_title: String,
        reason: Option<String>,
    },
    ChatMessage {
        to: String,
        sender_name: String,
        recipient_name: Option<String>,
        message_preview: String,
    },
    Welcome {
        to: String,
        name: Option<String>,
    },
    ContactForm {
        name: String,
        email: String,
        subject: Option<String>,
        message: String,
    },
    Feedback {
        name: String,
        email: String,
        rating: Option<u8>,
        message: String,
    },
}

impl EmailNotification {
    pub fn kind(&self) -> &'static str {
        match self {
            EmailNotification::BookingReceived { .. } => "booking_received",
            EmailNotification::AdminNewBooking { .. } => "admin_new_booking",
            EmailNotification::BookingConfirmed { .. } => "booking_confirmed",
            EmailNotification::OwnerBookingConfirmed { .. } => "owner_booking_confirmed",
            EmailNotification::BookingRejected { .. } => "booking_rejected",
            EmailNotification::PaymentRefunded { .. } => "payment_refunded",
            EmailNotification::PaymentCaptured { .. } => "payment_captured",
            EmailNotification::SubscriptionCompleted { .. } => "subscription_completed",
            EmailNotification::ListingSubmitted { .. } => "listing_submitted",
            EmailNotification::ListingApproved { .. } => "listing_approved",
            EmailNotification::ListingRejected { .. } => "listing_rejected",
            EmailNotification::ChatMessage { .. } => "chat_message",
            EmailNotification::Welcome { .. } => "welcome",
            EmailNotification::ContactForm { .. } => "contact_form",
            EmailNotification::Feedback { .. } => "feedback",
        }
    }

    /// Explicit recipient, or `None` when the email goes to the admin mailbox.
    pub fn recipient(&self) -> Option<&str> {
        match self {
            EmailNotification::BookingReceived { to, .. }
            | EmailNotification::BookingConfirmed { to, .. }
            | EmailNotification::OwnerBookingConfirmed { to, .. }
            | EmailNotification::BookingRejected { to, .. }
            | EmailNotification::PaymentRefunded { to, .. }
            | EmailNotification::PaymentCaptured { to, .. }
            | EmailNotification::SubscriptionCompleted { to, .. }
            | EmailNotification::ListingApproved { to, .. }
            | EmailNotification::ListingRejected { to, .. }
            | EmailNotification::ChatMessage { to, .. }
            | EmailNotification::Welcome { to, .. } => Some(to.as_str()),
            EmailNotification::AdminNewBooking { .. }
            | EmailNotification::ListingSubmitted { .. }
            | EmailNotification::ContactForm { .. }
            | EmailNotification::Feedback { .. } => None,
        }
    }

    /// Sender address for admin-bound messages that should be answerable directly.
    pub fn reply_to(&self) -> Option<&str> {
        match self {
            EmailNotification::ContactForm { email, .. }
            | EmailNotification::Feedback { email, .. } => Some(email.as_str()),
            EmailNotification::ListingSubmitted { owner_email, .. } => Some(owner_email.as_str()),
            EmailNotification::AdminNewBooking { renter_email, .. } => Some(renter_email.as_str()),
            _ => None,
        }
    }
}

/// A fully rendered email, ready for the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationResponse {
    pub success: bool,
    pub kind: &'static str,
    pub message_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub name: String,
    pub email: String,
    pub rating: Option<u8>,
    pub message: String,
}

/// Result of a contact or feedback submission. The message is stored even when the admin
/// email could not be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserMessageResponse {
    pub success: bool,
    pub message_id: Uuid,
    pub forwarded: bool,
}

/// Loose syntactic check: one `@`, non-empty local part, dotted domain, no whitespace.
pub fn is_valid_email(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() || value.len() > 254 || value.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_kind_selects_variant() {
        let notification: EmailNotification = serde_json::from_value(json!({
            "kind": "booking_rejected",
            "to": "renter@example.com",
            "renter_name": "Sam",
            "listing_title": "Covered bay",
            "reason": null
        }))
        .unwrap();

        assert_eq!(notification.kind(), "booking_rejected");
        assert_eq!(notification.recipient(), Some("renter@example.com"));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let result = serde_json::from_value::<EmailNotification>(json!({
            "kind": "newsletter",
            "to": "renter@example.com"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn contact_form_goes_to_admin_with_reply_to() {
        let notification = EmailNotification::ContactForm {
            name: "Alex".into(),
            email: "alex@example.com".into(),
            subject: None,
            message: "Is the bay covered?".into(),
        };

        assert_eq!(notification.recipient(), None);
        assert_eq!(notification.reply_to(), Some("alex@example.com"));
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("renter@example.com"));
        assert!(is_valid_email("  first.last+tag@mail.example.co.uk "));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("renter.example.com"));
        assert!(!is_valid_email("renter@localhost"));
        assert!(!is_valid_email("a@b@example.com"));
        assert!(!is_valid_email("re nter@example.com"));
        assert!(!is_valid_email("renter@.example.com"));
    }
}
