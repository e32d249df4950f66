//! The handler seam and the shared per-prospect batch driver.

use async_trait::async_trait;
use prospector_core::error::CoreError;
use prospector_core::job::{JobSummary, JobType};
use prospector_core::stage::{check_transition, Eligibility, Transition};
use prospector_db::models::job::Job;
use prospector_db::models::prospect::Prospect;
use tokio_util::sync::CancellationToken;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::transition;

/// Executes one job type.
///
/// Per-prospect failures are recorded in the returned summary; only fatal
/// errors (store failure, cancellation) are returned as `Err`.
#[async_trait]
pub trait StageHandler: Send + Sync {
    fn job_type(&self) -> JobType;

    async fn run(
        &self,
        ctx: &PipelineContext,
        job: &Job,
        cancel: &CancellationToken,
    ) -> Result<JobSummary, PipelineError>;
}

/// One transition applied to one prospect.
#[async_trait]
pub(crate) trait ProspectStep: Send + Sync {
    fn transition(&self) -> Transition;

    /// Data-level preconditions beyond the stage graph.
    fn precheck(&self, _ctx: &PipelineContext, _prospect: &Prospect) -> Result<(), CoreError> {
        Ok(())
    }

    /// Perform the external call (if any) and write the new stage.
    async fn apply(
        &self,
        ctx: &PipelineContext,
        prospect: &Prospect,
        eligibility: Eligibility,
    ) -> Result<Prospect, PipelineError>;
}

/// Load the prospects a job targets.
///
/// Explicit targets are loaded in order (unknown ids are recorded as
/// skipped). Without targets, the top-ranked prospects in the
/// transition's source stage are selected.
pub(crate) async fn load_targets(
    ctx: &PipelineContext,
    job: &Job,
    transition: Transition,
    summary: &mut JobSummary,
) -> Result<Vec<Prospect>, PipelineError> {
    if job.target_ids.is_empty() {
        return Ok(ctx
            .store
            .eligible_prospects(transition.source(), ctx.settings.batch_limit)
            .await?);
    }

    let found = ctx.store.find_prospects(&job.target_ids).await?;
    for id in &job.target_ids {
        if !found.iter().any(|p| p.id == *id) {
            summary.skipped(*id, "prospect not found");
        }
    }
    Ok(found)
}

/// Apply `step` to every targeted prospect, isolating per-prospect errors.
pub(crate) async fn run_transition<S: ProspectStep + ?Sized>(
    step: &S,
    ctx: &PipelineContext,
    job: &Job,
    cancel: &CancellationToken,
) -> Result<JobSummary, PipelineError> {
    let transition = step.transition();
    let mut summary = JobSummary::default();
    let prospects = load_targets(ctx, job, transition, &mut summary).await?;

    // Re-processing only applies to explicitly named prospects.
    let reprocess = job.parameters.reprocess && !job.target_ids.is_empty();

    tracing::info!(
        job_id = job.id,
        job_type = %job.job_type,
        count = prospects.len(),
        reprocess,
        "Applying transition",
    );

    for prospect in &prospects {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let eligibility =
            match check_transition(prospect.stage, prospect.failed_from, transition, reprocess) {
                Ok(e) => e,
                Err(e) => {
                    summary.skipped(prospect.id, e.to_string());
                    continue;
                }
            };
        if let Err(e) = step.precheck(ctx, prospect) {
            summary.skipped(prospect.id, e.to_string());
            continue;
        }

        // Shutdown interrupts an in-flight external call; the prospect keeps
        // its last committed stage.
        let applied = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(PipelineError::Cancelled),
            applied = step.apply(ctx, prospect, eligibility) => applied,
        };
        match applied {
            Ok(_) => summary.succeeded(prospect.id),
            Err(e) => record_failure(ctx, job, prospect, e, &mut summary).await?,
        }
    }

    Ok(summary)
}

/// Record a per-prospect error, moving the prospect to `FAILED` when an
/// external service definitively rejected it. Fatal errors propagate.
pub(crate) async fn record_failure(
    ctx: &PipelineContext,
    job: &Job,
    prospect: &Prospect,
    error: PipelineError,
    summary: &mut JobSummary,
) -> Result<(), PipelineError> {
    match error {
        e if e.is_fatal() => return Err(e),
        PipelineError::External(e) if e.is_rejected() => {
            let detail = e.to_string();
            tracing::warn!(
                job_id = job.id,
                prospect_id = prospect.id,
                error = %detail,
                "Prospect rejected by external service",
            );
            match transition::fail(ctx.store.as_ref(), prospect, &detail).await {
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(prospect_id = prospect.id, error = %e, "Could not mark prospect failed");
                }
            }
            summary.failed(Some(prospect.id), detail);
        }
        PipelineError::External(e) => {
            tracing::warn!(
                job_id = job.id,
                prospect_id = prospect.id,
                error = %e,
                "External call failed, prospect left in place",
            );
            summary.failed(Some(prospect.id), e.to_string());
        }
        PipelineError::ConcurrentModification { winner, .. } => {
            let now = winner.map_or("deleted".to_string(), |w| w.stage.to_string());
            summary.skipped(prospect.id, format!("concurrent modification, now {now}"));
        }
        PipelineError::Core(CoreError::PreconditionNotMet(detail)) => {
            summary.skipped(prospect.id, detail);
        }
        other => summary.failed(Some(prospect.id), other.to_string()),
    }
    Ok(())
}
