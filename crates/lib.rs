pub mod auth_provider;
pub mod domain;
pub mod infra;
pub mod notifications;
pub mod observability;
pub mod payments;
