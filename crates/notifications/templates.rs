use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::value_objects::notifications::{
    EmailNotification, OutboundEmail, is_valid_email,
};

/// Deployment-wide values every template needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSettings {
    pub from: String,
    pub admin_email: String,
    pub frontend_url: String,
    pub currency: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("invalid recipient email address: {0}")]
    InvalidRecipient(String),
    #[error("invalid reply-to email address: {0}")]
    InvalidReplyTo(String),
}

struct Rendered {
    subject: String,
    heading: String,
    paragraphs: Vec<String>,
    action: Option<(&'static str, String)>,
}

/// Renders a notification into a ready-to-send email.
///
/// Every interpolated value is HTML-escaped. Admin-bound kinds are addressed to
/// `settings.admin_email`.
pub fn render(
    notification: &EmailNotification,
    settings: &TemplateSettings,
) -> Result<OutboundEmail, TemplateError> {
    let to = notification
        .recipient()
        .unwrap_or(settings.admin_email.as_str())
        .trim()
        .to_string();
    if !is_valid_email(&to) {
        return Err(TemplateError::InvalidRecipient(to));
    }

    let reply_to = match notification.reply_to() {
        Some(address) if !is_valid_email(address) => {
            return Err(TemplateError::InvalidReplyTo(address.to_string()));
        }
        Some(address) => Some(address.trim().to_string()),
        None => None,
    };

    let rendered = content(notification, settings);

    Ok(OutboundEmail {
        from: settings.from.clone(),
        to: vec![to],
        subject: rendered.subject.clone(),
        html: layout(&rendered),
        reply_to,
    })
}

fn content(notification: &EmailNotification, settings: &TemplateSettings) -> Rendered {
    let money = |amount: f64| format_money(amount, &settings.currency);
    let link = |path: &str| format!("{}{}", settings.frontend_url.trim_end_matches('/'), path);

    match notification {
        EmailNotification::BookingReceived {
            renter_name,
            listing_title,
            start_time,
            end_time,
            amount,
            ..
        } => Rendered {
            subject: format!("Booking request received: {listing_title}"),
            heading: greeting(renter_name),
            paragraphs: vec![
                format!(
                    "We have received your booking request for <strong>{}</strong>.",
                    escape(listing_title)
                ),
                format!("Dates: {} to {}", date(start_time), date(end_time)),
                format!(
                    "A hold of {} has been placed on your card. You will only be charged once the booking is approved.",
                    money(*amount)
                ),
            ],
            action: Some(("View your bookings", link("/bookings"))),
        },
        EmailNotification::AdminNewBooking {
            booking_id,
            listing_title,
            renter_email,
            start_time,
            amount,
            payment_type,
        } => Rendered {
            subject: format!("New booking awaiting review: {listing_title}"),
            heading: "New booking request".to_string(),
            paragraphs: vec![
                format!("Listing: <strong>{}</strong>", escape(listing_title)),
                format!("Renter: {}", escape(renter_email)),
                format!("Starts: {}", date(start_time)),
                format!(
                    "Amount: {} ({})",
                    money(*amount),
                    escape(&payment_type.replace('_', "-"))
                ),
                format!("Booking reference: {booking_id}"),
            ],
            action: Some(("Review booking", link("/admin/bookings"))),
        },
        EmailNotification::BookingConfirmed {
            renter_name,
            listing_title,
            address,
            start_time,
            end_time,
            amount,
            ..
        } => {
            let mut paragraphs = vec![
                format!(
                    "Your booking for <strong>{}</strong> is confirmed.",
                    escape(listing_title)
                ),
                format!("Dates: {} to {}", date(start_time), date(end_time)),
            ];
            if let Some(address) = address {
                paragraphs.push(format!("Address: {}", escape(address)));
            }
            paragraphs.push(format!("Total: {}", money(*amount)));

            Rendered {
                subject: format!("Booking confirmed: {listing_title}"),
                heading: greeting(renter_name),
                paragraphs,
                action: Some(("View booking", link("/bookings"))),
            }
        }
        EmailNotification::OwnerBookingConfirmed {
            owner_name,
            listing_title,
            start_time,
            end_time,
            amount,
            ..
        } => Rendered {
            subject: format!("Your space has been booked: {listing_title}"),
            heading: greeting(owner_name),
            paragraphs: vec![
                format!(
                    "A booking for <strong>{}</strong> has been confirmed.",
                    escape(listing_title)
                ),
                format!("Dates: {} to {}", date(start_time), date(end_time)),
                format!("Booking value: {}", money(*amount)),
            ],
            action: Some(("Open dashboard", link("/dashboard"))),
        },
        EmailNotification::BookingRejected {
            renter_name,
            listing_title,
            reason,
            ..
        } => Rendered {
            subject: format!("Booking not approved: {listing_title}"),
            heading: greeting(renter_name),
            paragraphs: with_reason(
                vec![
                    format!(
                        "Unfortunately your booking for <strong>{}</strong> could not be approved.",
                        escape(listing_title)
                    ),
                    "The hold on your card has been released. No payment was taken.".to_string(),
                ],
                reason,
            ),
            action: Some(("Find another space", link("/search"))),
        },
        EmailNotification::PaymentRefunded {
            renter_name,
            listing_title,
            amount,
            reason,
            ..
        } => {
            let refunded = match amount {
                Some(amount) => format!("A refund of {} has been issued", money(*amount)),
                None => "A refund has been issued".to_string(),
            };
            Rendered {
                subject: format!("Refund issued: {listing_title}"),
                heading: greeting(renter_name),
                paragraphs: with_reason(
                    vec![
                        format!(
                            "{refunded} for your booking of <strong>{}</strong>.",
                            escape(listing_title)
                        ),
                        "Refunds usually appear on your statement within 5 to 10 business days."
                            .to_string(),
                    ],
                    reason,
                ),
                action: None,
            }
        }
        EmailNotification::PaymentCaptured {
            renter_name,
            listing_title,
            amount,
            security_deposit,
            ..
        } => {
            let mut paragraphs = vec![format!(
                "We have charged {} for your booking of <strong>{}</strong>.",
                money(*amount),
                escape(listing_title)
            )];
            if let Some(deposit) = security_deposit.filter(|d| *d > 0.0) {
                paragraphs.push(format!("This includes a security deposit of {}.", money(deposit)));
            }
            Rendered {
                subject: format!("Payment received: {listing_title}"),
                heading: greeting(renter_name),
                paragraphs,
                action: Some(("View booking", link("/bookings"))),
            }
        }
        EmailNotification::SubscriptionCompleted {
            renter_name,
            listing_title,
            ended_at,
            ..
        } => Rendered {
            subject: format!("Your parking subscription has ended: {listing_title}"),
            heading: greeting(renter_name),
            paragraphs: vec![
                format!(
                    "Your monthly booking for <strong>{}</strong> reached the end of its commitment on {}.",
                    escape(listing_title),
                    date(ended_at)
                ),
                "No further payments will be taken.".to_string(),
            ],
            action: Some(("Book again", link("/search"))),
        },
        EmailNotification::ListingSubmitted {
            listing_id,
            owner_email,
            listing_title,
            address,
        } => Rendered {
            subject: format!("New listing submitted: {listing_title}"),
            heading: "New listing awaiting approval".to_string(),
            paragraphs: vec![
                format!("Title: <strong>{}</strong>", escape(listing_title)),
                format!("Address: {}", escape(address)),
                format!("Owner: {}", escape(owner_email)),
                format!("Listing reference: {listing_id}"),
            ],
            action: Some(("Review listing", link("/admin/listings"))),
        },
        EmailNotification::ListingApproved {
            owner_name,
            listing_title,
            ..
        } => Rendered {
            subject: format!("Listing approved: {listing_title}"),
            heading: greeting(owner_name),
            paragraphs: vec![format!(
                "Your listing <strong>{}</strong> is now live and can be booked.",
                escape(listing_title)
            )],
            action: Some(("Open dashboard", link("/dashboard"))),
        },
        EmailNotification::ListingRejected {
            owner_name,
            listing_title,
            reason,
            ..
        } => Rendered {
            subject: format!("Listing not approved: {listing_title}"),
            heading: greeting(owner_name),
            paragraphs: with_reason(
                vec![format!(
                    "Your listing <strong>{}</strong> was not approved.",
                    escape(listing_title)
                )],
                reason,
            ),
            action: Some(("Edit listing", link("/dashboard"))),
        },
        EmailNotification::ChatMessage {
            sender_name,
            recipient_name,
            message_preview,
            ..
        } => Rendered {
            subject: format!("New message from {sender_name}"),
            heading: greeting(recipient_name),
            paragraphs: vec![
                format!("{} sent you a message:", escape(sender_name)),
                format!("<em>{}</em>", escape(&preview(message_preview))),
            ],
            action: Some(("Reply", link("/messages"))),
        },
        EmailNotification::Welcome { name, .. } => Rendered {
            subject: "Welcome to Parkbay".to_string(),
            heading: greeting(name),
            paragraphs: vec![
                "Thanks for joining. You can now book parking or list your own space.".to_string(),
            ],
            action: Some(("Get started", link("/"))),
        },
        EmailNotification::ContactForm {
            name,
            email,
            subject,
            message,
        } => Rendered {
            subject: format!(
                "Contact form: {}",
                subject.as_deref().unwrap_or("New enquiry")
            ),
            heading: "New contact form submission".to_string(),
            paragraphs: vec![
                format!("From: {} &lt;{}&gt;", escape(name), escape(email)),
                multiline(message),
            ],
            action: None,
        },
        EmailNotification::Feedback {
            name,
            email,
            rating,
            message,
        } => {
            let mut paragraphs = vec![format!("From: {} &lt;{}&gt;", escape(name), escape(email))];
            if let Some(rating) = rating {
                paragraphs.push(format!("Rating: {rating}/5"));
            }
            paragraphs.push(multiline(message));
            Rendered {
                subject: "New feedback received".to_string(),
                heading: "New feedback".to_string(),
                paragraphs,
                action: None,
            }
        }
    }
}

fn layout(rendered: &Rendered) -> String {
    let mut body = String::new();
    for paragraph in &rendered.paragraphs {
        body.push_str("<p style=\"margin:0 0 12px\">");
        body.push_str(paragraph);
        body.push_str("</p>");
    }

    if let Some((label, href)) = &rendered.action {
        body.push_str(&format!(
            "<p style=\"margin:24px 0\"><a href=\"{}\" style=\"background:#1d4ed8;color:#fff;padding:10px 18px;border-radius:6px;text-decoration:none\">{}</a></p>",
            escape(href),
            escape(label)
        ));
    }

    format!(
        "<!DOCTYPE html><html><body style=\"font-family:Arial,sans-serif;color:#111827;background:#f9fafb;padding:24px\"><div style=\"max-width:560px;margin:0 auto;background:#fff;padding:24px;border-radius:8px\"><h2 style=\"margin-top:0\">{}</h2>{}<p style=\"color:#6b7280;font-size:12px;margin-top:32px\">Parkbay</p></div></body></html>",
        escape(&rendered.heading),
        body
    )
}

fn greeting(name: &Option<String>) -> String {
    match name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("Hi {name},"),
        None => "Hi there,".to_string(),
    }
}

fn with_reason(mut paragraphs: Vec<String>, reason: &Option<String>) -> Vec<String> {
    if let Some(reason) = reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        paragraphs.push(format!("Reason: {}", escape(reason)));
    }
    paragraphs
}

fn multiline(text: &str) -> String {
    escape(text).replace('\n', "<br>")
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 200;
    if text.chars().count() <= LIMIT {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(LIMIT).collect();
    cut.push_str("...");
    cut
}

fn date(value: &DateTime<Utc>) -> String {
    value.format("%d %b %Y").to_string()
}

fn format_money(amount: f64, currency: &str) -> String {
    let symbol = match currency.to_ascii_lowercase().as_str() {
        "gbp" => "£".to_string(),
        "usd" => "$".to_string(),
        "eur" => "€".to_string(),
        other => format!("{} ", other.to_ascii_uppercase()),
    };
    format!("{symbol}{amount:.2}")
}

pub fn escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn settings() -> TemplateSettings {
        TemplateSettings {
            from: "Parkbay <bookings@parkbay.test>".into(),
            admin_email: "admin@parkbay.test".into(),
            frontend_url: "https://parkbay.test/".into(),
            currency: "gbp".into(),
        }
    }

    #[test]
    fn user_strings_are_escaped() {
        let email = render(
            &EmailNotification::BookingRejected {
                to: "renter@example.com".into(),
                renter_name: Some("<script>alert(1)</script>".into()),
                listing_title: "Bay & \"garage\"".into(),
                reason: Some("<b>full</b>".into()),
            },
            &settings(),
        )
        .unwrap();

        assert!(!email.html.contains("<script>"));
        assert!(email.html.contains("&lt;script&gt;"));
        assert!(email.html.contains("Bay &amp; &quot;garage&quot;"));
        assert!(email.html.contains("Reason: &lt;b&gt;full&lt;/b&gt;"));
    }

    #[test]
    fn admin_bound_kinds_go_to_admin_mailbox() {
        let email = render(
            &EmailNotification::Feedback {
                name: "Alex".into(),
                email: "alex@example.com".into(),
                rating: Some(4),
                message: "Great\nservice".into(),
            },
            &settings(),
        )
        .unwrap();

        assert_eq!(email.to, vec!["admin@parkbay.test".to_string()]);
        assert_eq!(email.reply_to.as_deref(), Some("alex@example.com"));
        assert!(email.html.contains("Rating: 4/5"));
        assert!(email.html.contains("Great<br>service"));
    }

    #[test]
    fn invalid_recipient_is_rejected() {
        let result = render(
            &EmailNotification::Welcome {
                to: "not-an-email".into(),
                name: None,
            },
            &settings(),
        );

        assert_eq!(
            result,
            Err(TemplateError::InvalidRecipient("not-an-email".into()))
        );
    }

    #[test]
    fn invalid_reply_to_is_rejected() {
        let result = render(
            &EmailNotification::ContactForm {
                name: "Alex".into(),
                email: "alex".into(),
                subject: None,
                message: "Hello".into(),
            },
            &settings(),
        );

        assert_eq!(result, Err(TemplateError::InvalidReplyTo("alex".into())));
    }

    #[test]
    fn booking_received_shows_amount_dates_and_link() {
        let email = render(
            &EmailNotification::BookingReceived {
                to: "renter@example.com".into(),
                renter_name: Some("Sam".into()),
                listing_title: "Covered bay".into(),
                start_time: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
                end_time: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
                amount: 1500.0,
            },
            &settings(),
        )
        .unwrap();

        assert_eq!(email.subject, "Booking request received: Covered bay");
        assert!(email.html.contains("Hi Sam,"));
        assert!(email.html.contains("£1500.00"));
        assert!(email.html.contains("01 Mar 2025 to 01 Jun 2025"));
        assert!(email.html.contains("href=\"https://parkbay.test/bookings\""));
    }

    #[test]
    fn zero_deposit_is_not_mentioned() {
        let email = render(
            &EmailNotification::PaymentCaptured {
                to: "renter@example.com".into(),
                renter_name: None,
                listing_title: "Covered bay".into(),
                amount: 1000.0,
                security_deposit: Some(0.0),
            },
            &settings(),
        )
        .unwrap();

        assert!(email.html.contains("Hi there,"));
        assert!(!email.html.contains("security deposit"));
    }

    #[test]
    fn long_chat_messages_are_previewed() {
        let email = render(
            &EmailNotification::ChatMessage {
                to: "owner@example.com".into(),
                sender_name: "Sam".into(),
                recipient_name: None,
                message_preview: "a".repeat(300),
            },
            &settings(),
        )
        .unwrap();

        assert!(email.html.contains(&format!("{}...", "a".repeat(200))));
        assert!(!email.html.contains(&"a".repeat(201)));
    }

    #[test]
    fn unknown_currency_uses_code() {
        assert_eq!(format_money(12.5, "chf"), "CHF 12.50");
        assert_eq!(format_money(2.0, "GBP"), "£2.00");
    }
}
