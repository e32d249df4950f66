//! Durable job queue.
//!
//! Jobs are persisted `pending` before anything runs. Claims go through
//! [`JobStore::claim_next`], which hands the oldest pending job of a type
//! to exactly one caller. Waiting claimers are woken by a per-type
//! [`Notify`] on enqueue and fall back to polling, since another replica
//! may have enqueued.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use prospector_core::error::CoreError;
use prospector_core::job::{JobStatus, JobSummary, JobType};
use prospector_core::types::DbId;
use prospector_db::models::job::{Job, JobListQuery, NewJob};
use prospector_db::Store;
use prospector_events::{EventBus, PipelineEvent};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::{WorkerError, WorkerResult};

/// Default interval between claim attempts while waiting.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Error recorded on jobs found `running` when a worker starts.
pub const ABANDONED_MESSAGE: &str = "abandoned: worker stopped before the job finished";

pub struct JobQueue {
    store: Arc<dyn Store>,
    events: Arc<EventBus>,
    notifiers: HashMap<JobType, Arc<Notify>>,
    poll_interval: Duration,
}

impl JobQueue {
    pub fn new(store: Arc<dyn Store>, events: Arc<EventBus>) -> Self {
        let notifiers = JobType::ALL
            .iter()
            .map(|t| (*t, Arc::new(Notify::new())))
            .collect();
        Self {
            store,
            events,
            notifiers,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    fn notifier(&self, job_type: JobType) -> &Notify {
        // Every type is registered in `new`.
        &self.notifiers[&job_type]
    }

    /// Persist a new pending job and wake one waiting worker of its type.
    pub async fn enqueue(&self, input: NewJob) -> WorkerResult<Job> {
        validate(&input)?;
        let job = self.store.insert_job(&input).await?;
        tracing::info!(
            job_id = job.id,
            job_type = %job.job_type,
            origin = %job.origin,
            targets = job.target_ids.len(),
            "Job enqueued",
        );
        self.notifier(job.job_type).notify_one();
        Ok(job)
    }

    /// Claim the oldest pending job of `job_type`, if any.
    pub async fn claim(&self, job_type: JobType) -> WorkerResult<Option<Job>> {
        let job = self.store.claim_next(job_type).await?;
        if let Some(job) = &job {
            tracing::info!(job_id = job.id, job_type = %job_type, "Job claimed");
        }
        Ok(job)
    }

    /// Claim a job, waiting up to `timeout` for one to become available.
    ///
    /// Returns `None` on timeout or cancellation.
    pub async fn claim_wait(
        &self,
        job_type: JobType,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> WorkerResult<Option<Job>> {
        let deadline = tokio::time::Instant::now() + timeout;
        let notify = self.notifier(job_type);

        loop {
            // Register before claiming so an enqueue between the claim and
            // the wait is not lost.
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(job) = self.claim(job_type).await? {
                return Ok(Some(job));
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let poll = (deadline - now).min(self.poll_interval);

            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = &mut notified => {}
                _ = tokio::time::sleep(poll) => {}
            }
        }
    }

    /// `running -> completed`, storing the handler summary.
    pub async fn complete(&self, job: &Job, summary: &JobSummary) -> WorkerResult<bool> {
        let result = summary.to_json();
        let done = self.store.complete_job(job.id, &result).await?;
        if done {
            tracing::info!(
                job_id = job.id,
                job_type = %job.job_type,
                succeeded = summary.succeeded,
                skipped = summary.skipped,
                failed = summary.failed,
                "Job completed",
            );
            self.publish(job, JobStatus::Completed, result);
        } else {
            tracing::warn!(job_id = job.id, "Job was no longer running, completion dropped");
        }
        Ok(done)
    }

    /// `pending | running -> failed` with a non-empty message.
    pub async fn fail(
        &self,
        job: &Job,
        error_message: &str,
        summary: Option<&JobSummary>,
    ) -> WorkerResult<bool> {
        let message = if error_message.trim().is_empty() {
            "job failed"
        } else {
            error_message
        };
        let result = summary.map(JobSummary::to_json);
        let done = self.store.fail_job(job.id, message, result.as_ref()).await?;
        if done {
            tracing::warn!(job_id = job.id, job_type = %job.job_type, error = message, "Job failed");
            self.publish(
                job,
                JobStatus::Failed,
                serde_json::json!({ "error_message": message, "result": result }),
            );
        }
        Ok(done)
    }

    /// Fail jobs still `running` from a previous process so their target
    /// sets can be claimed again. Call before any worker starts.
    pub async fn recover_abandoned(&self) -> WorkerResult<usize> {
        let abandoned = self.store.fail_running_jobs(ABANDONED_MESSAGE).await?;
        for job in &abandoned {
            tracing::warn!(job_id = job.id, job_type = %job.job_type, "Failed job abandoned by a previous worker");
            self.publish(
                job,
                JobStatus::Failed,
                serde_json::json!({ "error_message": ABANDONED_MESSAGE, "result": null }),
            );
        }
        Ok(abandoned.len())
    }

    /// Enqueue a copy of a failed job.
    pub async fn retry(&self, job_id: DbId) -> WorkerResult<Job> {
        let failed = self.get(job_id).await?;
        if failed.status != JobStatus::Failed {
            return Err(CoreError::Conflict(format!(
                "job {job_id} is {}, only failed jobs can be retried",
                failed.status
            ))
            .into());
        }
        self.enqueue(NewJob::retry_of(&failed)).await
    }

    pub async fn get(&self, job_id: DbId) -> WorkerResult<Job> {
        self.store
            .find_job(job_id)
            .await?
            .ok_or_else(|| WorkerError::Core(CoreError::NotFound { entity: "Job", id: job_id }))
    }

    pub async fn list(&self, query: &JobListQuery) -> WorkerResult<Vec<Job>> {
        Ok(self.store.list_jobs(query).await?)
    }

    fn publish(&self, job: &Job, status: JobStatus, payload: serde_json::Value) {
        if let Some(event) = PipelineEvent::job_finished(job.id, job.job_type, status, payload) {
            self.events.publish(event);
        }
    }
}

/// Reject parameter combinations no handler would honour.
fn validate(input: &NewJob) -> Result<(), CoreError> {
    if input.parameters.reprocess {
        if input.target_ids.is_empty() {
            return Err(CoreError::Validation(
                "reprocess requires explicit target_ids".into(),
            ));
        }
        if !input.job_type.transition().allows_reprocess() {
            return Err(CoreError::Validation(format!(
                "{} jobs cannot be re-processed",
                input.job_type
            )));
        }
    }
    let scoped = !input.parameters.locations.is_empty() || !input.parameters.categories.is_empty();
    if scoped && input.job_type != JobType::Discover {
        return Err(CoreError::Validation(
            "locations and categories only apply to discover jobs".into(),
        ));
    }
    if input.target_ids.iter().any(|id| *id <= 0) {
        return Err(CoreError::Validation("target_ids must be positive".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use prospector_core::job::JobParameters;
    use prospector_db::MemoryStore;

    use super::*;

    fn queue() -> JobQueue {
        JobQueue::new(Arc::new(MemoryStore::new()), Arc::new(EventBus::default()))
            .with_poll_interval(Duration::from_millis(20))
    }

    #[tokio::test]
    async fn claim_wait_wakes_on_enqueue() {
        let queue = Arc::new(queue());
        let cancel = CancellationToken::new();

        let waiter = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                queue
                    .claim_wait(JobType::Score, Duration::from_secs(5), &cancel)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let job = queue.enqueue(NewJob::manual(JobType::Score, vec![])).await.unwrap();

        let claimed = waiter.await.unwrap().unwrap().unwrap();
        assert_eq!(claimed.id, job.id);
        assert_eq!(claimed.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn claim_wait_times_out_empty() {
        let queue = queue();
        let got = queue
            .claim_wait(JobType::Send, Duration::from_millis(60), &CancellationToken::new())
            .await
            .unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn types_are_independent() {
        let queue = queue();
        queue.enqueue(NewJob::manual(JobType::Enrich, vec![])).await.unwrap();
        assert!(queue.claim(JobType::Score).await.unwrap().is_none());
        assert!(queue.claim(JobType::Enrich).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn completion_publishes_event() {
        let queue = queue();
        let mut rx = queue.events().subscribe();
        queue.enqueue(NewJob::manual(JobType::Score, vec![])).await.unwrap();
        let job = queue.claim(JobType::Score).await.unwrap().unwrap();

        let mut summary = JobSummary::default();
        summary.succeeded(7);
        assert!(queue.complete(&job, &summary).await.unwrap());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "job.completed");
        assert_eq!(event.job_id, Some(job.id));
        assert_eq!(queue.get(job.id).await.unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn retry_only_from_failed() {
        let queue = queue();
        let job = queue
            .enqueue(NewJob::manual(JobType::Verify, vec![3, 4]))
            .await
            .unwrap();
        assert_matches!(
            queue.retry(job.id).await,
            Err(WorkerError::Core(CoreError::Conflict(_)))
        );

        let running = queue.claim(JobType::Verify).await.unwrap().unwrap();
        queue.fail(&running, "store unavailable", None).await.unwrap();

        let retry = queue.retry(job.id).await.unwrap();
        assert_eq!(retry.retry_of_job_id, Some(job.id));
        assert_eq!(retry.target_ids, vec![3, 4]);
        assert_eq!(retry.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn startup_recovery_releases_abandoned_jobs() {
        let queue = queue();
        let mut rx = queue.events().subscribe();
        let stale = queue.enqueue(NewJob::manual(JobType::Discover, vec![])).await.unwrap();
        queue.claim(JobType::Discover).await.unwrap().unwrap();
        queue.enqueue(NewJob::manual(JobType::Discover, vec![])).await.unwrap();

        // The running job blocks its target set until it is recovered.
        assert!(queue.claim(JobType::Discover).await.unwrap().is_none());

        assert_eq!(queue.recover_abandoned().await.unwrap(), 1);
        let recovered = queue.get(stale.id).await.unwrap();
        assert_eq!(recovered.status, JobStatus::Failed);
        assert_eq!(recovered.error_message.as_deref(), Some(ABANDONED_MESSAGE));
        assert!(recovered.completed_at.is_some());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "job.failed");
        assert_eq!(event.job_id, Some(stale.id));

        assert!(queue.claim(JobType::Discover).await.unwrap().is_some());
        assert_eq!(queue.recover_abandoned().await.unwrap(), 1);
        assert_eq!(queue.recover_abandoned().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn retry_of_unknown_job_is_not_found() {
        assert_matches!(
            queue().retry(404).await,
            Err(WorkerError::Core(CoreError::NotFound { .. }))
        );
    }

    #[tokio::test]
    async fn reprocess_needs_targets_and_is_never_send() {
        let queue = queue();
        let reprocess = JobParameters {
            reprocess: true,
            ..Default::default()
        };
        assert_matches!(
            queue
                .enqueue(NewJob::manual(JobType::Score, vec![]).with_parameters(reprocess.clone()))
                .await,
            Err(WorkerError::Core(CoreError::Validation(_)))
        );
        assert_matches!(
            queue
                .enqueue(NewJob::manual(JobType::Send, vec![1]).with_parameters(reprocess))
                .await,
            Err(WorkerError::Core(CoreError::Validation(_)))
        );
    }
}
