//! Periodic automation scheduler.
//!
//! Ticks the [`AutomationController`] on a fixed interval. Configuration
//! is re-read on every tick, so switch and interval changes take effect
//! without a restart.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::automation::AutomationController;

/// Run the scheduler loop until `cancel` is triggered.
pub async fn run(controller: Arc<AutomationController>, tick: Duration, cancel: CancellationToken) {
    tracing::info!(tick_secs = tick.as_secs(), "Automation scheduler started");

    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Automation scheduler stopping");
                break;
            }
            _ = interval.tick() => {
                match controller.tick(Utc::now()).await {
                    Ok(Some(job)) => {
                        tracing::debug!(job_id = job.id, "Scheduler tick enqueued discovery");
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(error = %e, "Scheduler tick failed");
                    }
                }
            }
        }
    }
}
