pub mod resend_client;
pub mod templates;
