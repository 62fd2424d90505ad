pub mod auth_provider;
pub mod bookings;
pub mod email_gateway;
pub mod listings;
pub mod payment_gateway;
pub mod payment_provider_customers;
pub mod rate_limits;
pub mod spaces;
pub mod user_messages;
pub mod user_roles;
