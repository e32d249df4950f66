//! Structured logging of bus traffic.
//!
//! [`EventLog`] subscribes to the [`EventBus`](crate::bus::EventBus) and
//! writes every event as a `tracing` record. It runs as a long-lived
//! background task until cancelled or until the bus is dropped.

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bus::PipelineEvent;

pub struct EventLog;

impl EventLog {
    /// Run the logging loop.
    pub async fn run(mut receiver: broadcast::Receiver<PipelineEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Event log stopping");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(event) => Self::record(&event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Event log lagged, some events were not logged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, event log shutting down");
                        break;
                    }
                },
            }
        }
    }

    fn record(event: &PipelineEvent) {
        tracing::info!(
            event_type = %event.event_type,
            job_id = ?event.job_id,
            job_type = ?event.job_type.map(|t| t.as_str()),
            payload = %event.payload,
            "Pipeline event",
        );
    }
}
