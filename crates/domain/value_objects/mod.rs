pub mod amounts;
pub mod availability;
pub mod bookings;
pub mod change_feed;
pub mod email_verification;
pub mod enums;
pub mod notifications;
pub mod rate_limits;
