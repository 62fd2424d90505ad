use anyhow::{Context, Result};

use super::{
    config_model::{
        BackendServer, BookingPolicy, ConfirmationResend, Database, DotEnvyConfig, Email,
        Frontend, Stripe, Supabase,
    },
    stage::Stage,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?.parse()?,
        body_limit: required("SERVER_BODY_LIMIT")?.parse()?,
        timeout: required("SERVER_TIMEOUT")?.parse()?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
    };

    let supabase = Supabase {
        project_url: required("SUPABASE_PROJECT_URL")?,
        jwt_secret: required("SUPABASE_JWT_SECRET")?,
        service_role_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
        currency: optional("STRIPE_CURRENCY")
            .unwrap_or_else(|| "gbp".to_string())
            .to_ascii_lowercase(),
    };

    let email = Email {
        resend_api_key: required("RESEND_API_KEY")?,
        from: required("EMAIL_FROM")?,
        admin_email: required("ADMIN_EMAIL")?,
    };

    let frontend = Frontend {
        url: required("FRONTEND_URL")?.trim_end_matches('/').to_string(),
    };

    let booking_policy = BookingPolicy {
        pre_authorization_expiry_days: parsed_or("PRE_AUTHORIZATION_EXPIRY_DAYS", 7)?,
        confirmation_window_hours: parsed_or("CONFIRMATION_WINDOW_HOURS", 48)?,
    };

    let confirmation_resend = ConfirmationResend {
        max_hits: parsed_or("CONFIRMATION_RESEND_MAX", 1)?,
        window_secs: parsed_or("CONFIRMATION_RESEND_WINDOW_SECS", 60)?,
    };

    Ok(DotEnvyConfig {
        stage: get_stage(),
        backend_server,
        database,
        supabase,
        stripe,
        email,
        frontend,
        booking_policy,
        confirmation_resend,
    })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or_default();
    Stage::try_from(&stage_str).unwrap_or_default()
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} is invalid"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} is invalid")),
        None => Ok(default),
    }
}
