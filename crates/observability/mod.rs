mod alerts;
mod config;
mod layer;
mod webhook_sink;

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use alerts::{AlertDispatcher, AlertSink};
use config::ObservabilityConfig;
use layer::OpsAlertLayer;
use webhook_sink::ChatWebhookSink;

/// Installs the global subscriber for a binary.
///
/// Logs go to stdout with local RFC 3339 timestamps, filtered by `RUST_LOG` (default
/// `info`). When `OPS_ALERT_WEBHOOK_URL` is set, events at `OPS_ALERT_LEVEL` and above are
/// also posted to that webhook. Must be called from inside the tokio runtime.
pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);
    let mut warnings = config.warnings.clone();

    let alert_layer = match config.ops_alert.as_ref() {
        Some(ops_alert) => match ChatWebhookSink::new(ops_alert.webhook_url.clone()) {
            Ok(sink) => {
                let sinks: Vec<Arc<dyn AlertSink>> = vec![Arc::new(sink)];
                Some(
                    OpsAlertLayer::new(
                        AlertDispatcher::spawn(sinks),
                        config.service_context.clone(),
                        ops_alert.min_level,
                    )
                    .with_filter(tracing_subscriber::filter::LevelFilter::from_level(
                        ops_alert.min_level,
                    )),
                )
            }
            Err(err) => {
                warnings.push(format!("ops alert client could not be built: {err}"));
                None
            }
        },
        None => None,
    };
    let alerts_enabled = alert_layer.is_some();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    let context = &config.service_context;
    for warning in &warnings {
        warn!(
            service = %context.service_name,
            stage = %context.stage,
            component = %context.component,
            warning = %warning,
            "observability: config warning"
        );
    }

    info!(
        service = %context.service_name,
        stage = %context.stage,
        component = %context.component,
        ops_alerts = alerts_enabled,
        "observability: initialised"
    );

    Ok(())
}
