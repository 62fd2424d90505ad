pub mod bookings;
pub mod listings;
pub mod payment_provider_customers;
pub mod spaces;
pub mod user_messages;
