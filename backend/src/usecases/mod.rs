pub mod auth_emails;
pub mod availability;
pub mod booking_payments;
pub mod notifications;
