use anyhow::Result;
use parkbay::{
    domain::repositories::{
        bookings::BookingRepository, email_gateway::EmailGateway, listings::ListingRepository,
        payment_gateway::PaymentGateway,
    },
    infra::db::{
        postgres::postgres_connection,
        repositories::{bookings::BookingPostgres, listings::ListingPostgres},
    },
    notifications::{resend_client::ResendClient, templates::TemplateSettings},
    payments::stripe_client::StripeClient,
};
use std::{sync::Arc, time::Duration};
use tracing::{error, info};
use worker::{
    axum_http, config, services::worker_loop,
    usecases::subscription_commitments::SubscriptionCommitmentUseCase,
};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(error) = run().await {
        error!("Worker exited with error: {}", error);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    parkbay::observability::init_observability("worker")?;

    let dotenvy_env = Arc::new(config::config_loader::load()?);
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(&dotenvy_env.database.url)?;
    info!("Postgres connection has been established");

    let db_pool_arc = Arc::new(postgres_pool);
    let frontend_url = dotenvy_env.frontend.url.trim_end_matches('/').to_string();

    let booking_repository: Arc<dyn BookingRepository + Send + Sync> =
        Arc::new(BookingPostgres::new(Arc::clone(&db_pool_arc)));
    let listing_repository: Arc<dyn ListingRepository + Send + Sync> =
        Arc::new(ListingPostgres::new(Arc::clone(&db_pool_arc)));

    let payment_gateway: Arc<dyn PaymentGateway + Send + Sync> = Arc::new(StripeClient::new(
        dotenvy_env.stripe.secret_key.clone(),
        dotenvy_env.stripe.webhook_secret.clone(),
        dotenvy_env.stripe.currency.clone(),
        format!("{frontend_url}/booking/success"),
        format!("{frontend_url}/booking/cancelled"),
    ));
    let email_gateway: Arc<dyn EmailGateway + Send + Sync> = Arc::new(ResendClient::new(
        dotenvy_env.email.resend_api_key.clone(),
    ));

    let sweep_usecase = Arc::new(SubscriptionCommitmentUseCase::new(
        booking_repository,
        listing_repository,
        payment_gateway,
        email_gateway,
        TemplateSettings {
            from: dotenvy_env.email.from.clone(),
            admin_email: dotenvy_env.email.admin_email.clone(),
            frontend_url,
            currency: dotenvy_env.stripe.currency.clone(),
        },
    ));

    // Spawn background loop
    let sweep_loop = tokio::spawn(worker_loop::run_commitment_sweeps(
        Arc::clone(&sweep_usecase),
        Duration::from_secs(dotenvy_env.sweep.interval_secs),
    ));

    let server_config = Arc::clone(&dotenvy_env);
    let http_server = tokio::spawn(async move {
        axum_http::http_serve::start(server_config, sweep_usecase).await
    });

    info!("Worker started");

    tokio::select! {
        result = sweep_loop => result??,
        result = http_server => result??,
    };
    Ok(())
}
