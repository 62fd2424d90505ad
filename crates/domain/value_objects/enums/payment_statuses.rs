use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Payment progress of a booking, mirrored from the provider resource.
///
/// Statuses only move forward: once funds were captured or released the booking can
/// never return to `Pending` or `PreAuthorized`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    PreAuthorized,
    Confirmed,
    PartiallyCaptured,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::PreAuthorized => "pre_authorized",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::PartiallyCaptured => "partially_captured",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PaymentStatus::Pending),
            "pre_authorized" => Some(PaymentStatus::PreAuthorized),
            "confirmed" => Some(PaymentStatus::Confirmed),
            "partially_captured" => Some(PaymentStatus::PartiallyCaptured),
            "paid" => Some(PaymentStatus::Paid),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;

        matches!(
            (self, next),
            (Pending, PreAuthorized)
                | (Pending, Refunded)
                | (PreAuthorized, Confirmed)
                | (PreAuthorized, PartiallyCaptured)
                | (PreAuthorized, Refunded)
                | (Confirmed, Paid)
                | (Confirmed, Refunded)
                | (PartiallyCaptured, Refunded)
                | (Paid, Paid)
                | (Paid, Refunded)
        )
    }

    /// Whether money has been taken from the renter under this status.
    pub fn has_captured_funds(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Confirmed | PaymentStatus::PartiallyCaptured | PaymentStatus::Paid
        )
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [PaymentStatus; 6] = [
        PaymentStatus::Pending,
        PaymentStatus::PreAuthorized,
        PaymentStatus::Confirmed,
        PaymentStatus::PartiallyCaptured,
        PaymentStatus::Paid,
        PaymentStatus::Refunded,
    ];

    #[test]
    fn captured_or_refunded_never_regress() {
        for from in [
            PaymentStatus::Confirmed,
            PaymentStatus::PartiallyCaptured,
            PaymentStatus::Paid,
            PaymentStatus::Refunded,
        ] {
            assert!(!from.can_transition_to(PaymentStatus::Pending), "{from}");
            assert!(!from.can_transition_to(PaymentStatus::PreAuthorized), "{from}");
        }
    }

    #[test]
    fn refunded_is_terminal() {
        for next in ALL {
            assert!(!PaymentStatus::Refunded.can_transition_to(next));
        }
    }

    #[test]
    fn pre_authorization_leads_to_capture_or_refund() {
        let from = PaymentStatus::PreAuthorized;
        assert!(from.can_transition_to(PaymentStatus::Confirmed));
        assert!(from.can_transition_to(PaymentStatus::PartiallyCaptured));
        assert!(from.can_transition_to(PaymentStatus::Refunded));
        assert!(!from.can_transition_to(PaymentStatus::Paid));
    }

    #[test]
    fn pending_cannot_skip_to_capture() {
        assert!(!PaymentStatus::Pending.can_transition_to(PaymentStatus::Confirmed));
        assert!(!PaymentStatus::Pending.can_transition_to(PaymentStatus::PartiallyCaptured));
    }

    #[test]
    fn db_strings_round_trip() {
        for status in ALL {
            assert_eq!(PaymentStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(PaymentStatus::from_str("paid_out"), None);
    }
}
