pub mod auth_emails;
pub mod availability;
pub mod bookings;
pub mod notifications;
pub mod payments;
