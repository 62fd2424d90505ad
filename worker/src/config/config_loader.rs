use super::config_model::{
    CommitmentSweep, Database, DotEnvyConfig, Email, Frontend, Stripe, WorkerServer,
};
use anyhow::{Context, Result};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let worker_server = WorkerServer {
        port: required("SERVER_PORT_WORKER")?
            .parse()
            .context("SERVER_PORT_WORKER is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: optional("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
        currency: optional("STRIPE_CURRENCY").unwrap_or_else(|| "gbp".to_string()),
    };

    let from = required("EMAIL_FROM")?;
    let email = Email {
        resend_api_key: required("RESEND_API_KEY")?,
        admin_email: optional("ADMIN_EMAIL").unwrap_or_else(|| from.clone()),
        from,
    };

    let frontend = Frontend {
        url: optional("FRONTEND_URL").unwrap_or_else(|| "http://localhost:3000".to_string()),
    };

    let sweep = CommitmentSweep {
        internal_token: optional("INTERNAL_SWEEP_TOKEN"),
        interval_secs: optional("COMMITMENT_SWEEP_INTERVAL_SECS")
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("COMMITMENT_SWEEP_INTERVAL_SECS is invalid")?
            .filter(|v| *v > 0)
            .unwrap_or(3600),
    };

    Ok(DotEnvyConfig {
        worker_server,
        database,
        stripe,
        email,
        frontend,
        sweep,
    })
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} is invalid"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|v| {
        let trimmed = v.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}
