//! Fixed pool of worker loops.
//!
//! Each job type gets its own set of loops so a slow type never blocks
//! another. A loop claims the next job of its type, runs the handler, and
//! records the outcome. On cancellation the job in hand is failed with a
//! cancellation message; prospects keep their last committed stage.

use std::sync::Arc;
use std::time::Duration;

use prospector_core::job::JobType;
use prospector_db::models::job::Job;
use prospector_pipeline::{run_job, PipelineContext, PipelineError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::queue::JobQueue;

/// Pause after a claim error before trying again.
const CLAIM_ERROR_BACKOFF: Duration = Duration::from_secs(2);

/// Error message stored on a job interrupted by shutdown.
pub const CANCELLED_MESSAGE: &str = "cancelled: worker shutting down";

#[derive(Clone)]
pub struct WorkerPool {
    queue: Arc<JobQueue>,
    ctx: PipelineContext,
    workers_per_type: usize,
    claim_timeout: Duration,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<JobQueue>,
        ctx: PipelineContext,
        workers_per_type: usize,
        claim_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            ctx,
            workers_per_type: workers_per_type.max(1),
            claim_timeout,
        }
    }

    /// Spawn every worker loop. Each runs until `cancel` fires.
    pub fn spawn(&self, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        tracing::info!(
            workers_per_type = self.workers_per_type,
            job_types = JobType::ALL.len(),
            "Starting worker pool",
        );
        JobType::ALL
            .iter()
            .flat_map(|job_type| (0..self.workers_per_type).map(move |slot| (*job_type, slot)))
            .map(|(job_type, slot)| {
                let pool = self.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { pool.run_worker(job_type, slot, cancel).await })
            })
            .collect()
    }

    /// One worker loop for `job_type`.
    pub async fn run_worker(&self, job_type: JobType, slot: usize, cancel: CancellationToken) {
        tracing::debug!(%job_type, slot, "Worker started");
        while !cancel.is_cancelled() {
            match self
                .queue
                .claim_wait(job_type, self.claim_timeout, &cancel)
                .await
            {
                Ok(Some(job)) => self.execute(&job, &cancel).await,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(%job_type, slot, error = %e, "Claim failed");
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(CLAIM_ERROR_BACKOFF) => {}
                    }
                }
            }
        }
        tracing::debug!(%job_type, slot, "Worker stopped");
    }

    /// Run one claimed job to a terminal status.
    pub async fn execute(&self, job: &Job, cancel: &CancellationToken) {
        let recorded = match run_job(&self.ctx, job, cancel).await {
            Ok(summary) => self.queue.complete(job, &summary).await,
            Err(PipelineError::Cancelled) => self.queue.fail(job, CANCELLED_MESSAGE, None).await,
            Err(e) => {
                tracing::error!(job_id = job.id, job_type = %job.job_type, error = %e, "Job aborted");
                self.queue.fail(job, &e.to_string(), None).await
            }
        };
        if let Err(e) = recorded {
            tracing::error!(job_id = job.id, error = %e, "Could not record job outcome");
        }
    }
}
