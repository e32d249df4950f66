//! `VERIFIED -> DRAFTED`: one drafting call per prospect.

use async_trait::async_trait;
use prospector_adapters::types::DraftRequest;
use prospector_core::error::CoreError;
use prospector_core::job::{JobSummary, JobType};
use prospector_core::stage::{check_draft_eligibility, Eligibility, Stage, Transition};
use prospector_db::models::job::Job;
use prospector_db::models::prospect::{Prospect, ProspectUpdate};
use tokio_util::sync::CancellationToken;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::handler::{run_transition, ProspectStep, StageHandler};
use crate::transition;

#[derive(Debug, Clone, Copy, Default)]
pub struct DraftHandler;

#[async_trait]
impl ProspectStep for DraftHandler {
    fn transition(&self) -> Transition {
        Transition::Draft
    }

    fn precheck(&self, ctx: &PipelineContext, prospect: &Prospect) -> Result<(), CoreError> {
        check_draft_eligibility(
            prospect.contact_email.as_deref(),
            prospect.verification_status,
            prospect.score,
            ctx.settings.draft_min_score,
        )
    }

    async fn apply(
        &self,
        ctx: &PipelineContext,
        prospect: &Prospect,
        _eligibility: Eligibility,
    ) -> Result<Prospect, PipelineError> {
        let contact_email = prospect.contact_email.clone().ok_or_else(|| {
            CoreError::PreconditionNotMet("draft requires a contact email".into())
        })?;
        let request = DraftRequest {
            prospect_id: prospect.id,
            url: prospect.url.clone(),
            domain: prospect.domain.clone(),
            title: prospect.title.clone(),
            category: prospect.category,
            contact_email,
            score: prospect.score,
        };
        let draft = ctx.adapters.draft(&request).await?;
        let update = ProspectUpdate {
            draft_subject: Some(draft.subject),
            draft_body: Some(draft.body),
            ..Default::default()
        };
        transition::advance(ctx.store.as_ref(), prospect, Transition::Draft, Stage::Drafted, update)
            .await
    }
}

#[async_trait]
impl StageHandler for DraftHandler {
    fn job_type(&self) -> JobType {
        JobType::Draft
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
