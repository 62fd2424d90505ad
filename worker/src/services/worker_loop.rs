use crate::usecases::subscription_commitments::{
    CommitmentSweepParams, SubscriptionCommitmentUseCase,
};
use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Runs the commitment sweep on a fixed interval. A failed sweep is logged and
/// retried on the next tick.
pub async fn run_commitment_sweeps(
    usecase: Arc<SubscriptionCommitmentUseCase>,
    interval: Duration,
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(interval_secs = interval.as_secs(), "commitment sweep loop started");

    loop {
        ticker.tick().await;

        match usecase.run(CommitmentSweepParams::default()).await {
            Ok(result) if result.due > 0 || result.failed > 0 => {
                info!(
                    due = result.due,
                    cancelled = result.cancelled,
                    failed = result.failed,
                    "commitment sweep tick processed bookings"
                );
            }
            Ok(_) => {}
            Err(err) => error!(error = ?err, "commitment sweep tick failed"),
        }
    }
}
