//! `ENRICHED -> SCORED`. Pure: no external call.

use async_trait::async_trait;
use prospector_core::job::{JobSummary, JobType};
use prospector_core::stage::{Eligibility, Stage, Transition};
use prospector_db::models::job::Job;
use prospector_db::models::prospect::{Prospect, ProspectUpdate};
use tokio_util::sync::CancellationToken;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::handler::{run_transition, ProspectStep, StageHandler};
use crate::transition;

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreHandler;

/// Score and breakdown for a prospect snapshot, as a stage-write update.
pub(crate) fn score_update(ctx: &PipelineContext, prospect: &Prospect) -> ProspectUpdate {
    let result = ctx.scoring.score(&prospect.scoring_input());
    ProspectUpdate {
        score: Some(result.score),
        score_breakdown: Some(result.breakdown),
        ..Default::default()
    }
}

#[async_trait]
impl ProspectStep for ScoreHandler {
    fn transition(&self) -> Transition {
        Transition::Score
    }

    async fn apply(
        &self,
        ctx: &PipelineContext,
        prospect: &Prospect,
        _eligibility: Eligibility,
    ) -> Result<Prospect, PipelineError> {
        let update = score_update(ctx, prospect);
        transition::advance(ctx.store.as_ref(), prospect, Transition::Score, Stage::Scored, update)
            .await
    }
}

#[async_trait]
impl StageHandler for ScoreHandler {
    fn job_type(&self) -> JobType {
        JobType::Score
    }

    async fn run(
        &self,
        ctx: &PipelineContext,
        job: &Job,
        cancel: &CancellationToken,
    ) -> Result<JobSummary, PipelineError> {
        run_transition(self, ctx, job, cancel).await
    }
}
