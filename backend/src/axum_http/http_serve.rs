use crate::{
    auth::SupabaseJwtVerifier,
    axum_http::{default_routers, routers},
    config::{config_model::DotEnvyConfig, stage::Stage},
    usecases::{booking_payments::BookingPolicy, notifications::EmailDispatcher},
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use parkbay::{
    infra::{
        db::postgres::postgres_connection::PgPoolSquad,
        rate_limit::in_memory::InMemoryRateLimitStore, realtime::change_feed::ChangeFeed,
    },
    notifications::{resend_client::ResendClient, templates::TemplateSettings},
    payments::stripe_client::StripeClient,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let frontend_url = config.frontend.url.trim_end_matches('/').to_string();

    let stripe_client = Arc::new(StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.webhook_secret.clone(),
        config.stripe.currency.clone(),
        format!("{frontend_url}/booking/success"),
        format!("{frontend_url}/booking/cancelled"),
    ));
    let email_dispatcher = Arc::new(EmailDispatcher::new(
        Arc::new(ResendClient::new(config.email.resend_api_key.clone())),
        TemplateSettings {
            from: config.email.from.clone(),
            admin_email: config.email.admin_email.clone(),
            frontend_url: frontend_url.clone(),
            currency: config.stripe.currency.clone(),
        },
    ));
    let change_feed = ChangeFeed::new();
    let rate_limits = Arc::new(InMemoryRateLimitStore::new());
    let jwt_verifier = Arc::new(SupabaseJwtVerifier::new(&config.supabase.jwt_secret));

    let booking_usecase = routers::bookings::build_usecase(
        Arc::clone(&db_pool),
        stripe_client,
        Arc::clone(&email_dispatcher),
        change_feed.clone(),
        BookingPolicy {
            pre_authorization_expiry_days: config.booking_policy.pre_authorization_expiry_days,
            confirmation_window_hours: config.booking_policy.confirmation_window_hours,
        },
    );

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/api/v1/bookings",
            routers::bookings::routes(Arc::clone(&booking_usecase)),
        )
        .nest(
            "/api/v1/payments",
            routers::payments::routes(booking_usecase),
        )
        .nest(
            "/api/v1",
            routers::availability::routes(Arc::clone(&db_pool), change_feed)
                .merge(routers::notifications::routes(
                    Arc::clone(&db_pool),
                    email_dispatcher,
                    Arc::clone(&rate_limits),
                )),
        )
        .nest(
            "/api/v1/auth",
            routers::auth_emails::routes(Arc::clone(&config), rate_limits),
        )
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(Extension(jwt_verifier))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(cors_layer(config.stage, &frontend_url)?)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(
        port = config.backend_server.port,
        stage = %config.stage,
        "Server is running"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn cors_layer(stage: Stage, frontend_url: &str) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    match stage {
        Stage::Production => {
            let origin = HeaderValue::from_str(frontend_url)
                .with_context(|| format!("FRONTEND_URL {frontend_url} is not a valid origin"))?;
            Ok(layer.allow_origin(origin))
        }
        Stage::Local | Stage::Development => Ok(layer.allow_origin(Any)),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
