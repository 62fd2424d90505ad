pub mod availability_statuses;
pub mod booking_statuses;
pub mod listing_statuses;
pub mod payment_statuses;
pub mod payment_types;
pub mod space_statuses;
