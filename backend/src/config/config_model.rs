use super::stage::Stage;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub stage: Stage,
    pub backend_server: BackendServer,
    pub database: Database,
    pub supabase: Supabase,
    pub stripe: Stripe,
    pub email: Email,
    pub frontend: Frontend,
    pub booking_policy: BookingPolicy,
    pub confirmation_resend: ConfirmationResend,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    /// Megabytes.
    pub body_limit: u64,
    /// Seconds.
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Supabase {
    pub project_url: String,
    pub jwt_secret: String,
    pub service_role_key: String,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct Email {
    pub resend_api_key: String,
    pub from: String,
    pub admin_email: String,
}

#[derive(Debug, Clone)]
pub struct Frontend {
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingPolicy {
    pub pre_authorization_expiry_days: i64,
    pub confirmation_window_hours: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationResend {
    pub max_hits: u32,
    pub window_secs: u64,
}
