//! `SCORED -> VERIFIED | UNVERIFIED`.
//!
//! A prospect without an email goes straight to `UNVERIFIED` with no
//! external call. The score is recomputed in the same write so the
//! `email_confidence` factor reflects the verification.

use async_trait::async_trait;
use prospector_core::job::{JobSummary, JobType};
use prospector_core::stage::{Eligibility, Stage, Transition, VerificationStatus};
use prospector_db::models::job::Job;
use prospector_db::models::prospect::{Prospect, ProspectUpdate};
use tokio_util::sync::CancellationToken;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::handler::{run_transition, ProspectStep, StageHandler};
use crate::handlers::score::score_update;
use crate::transition;

#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyHandler;

#[async_trait]
impl ProspectStep for VerifyHandler {
    fn transition(&self) -> Transition {
        Transition::Verify
    }

    async fn apply(
        &self,
        ctx: &PipelineContext,
        prospect: &Prospect,
        _eligibility: Eligibility,
    ) -> Result<Prospect, PipelineError> {
        let email = prospect
            .contact_email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());

        let mut checked = prospect.clone();
        checked.verification_confidence = None;
        checked.verification = None;
        let mut update = match email {
            None => ProspectUpdate {
                verification_status: Some(VerificationStatus::Unverified),
                replace_verification: true,
                ..Default::default()
            },
            Some(email) => {
                let result = ctx.adapters.verify(email).await?;
                let status = if result.deliverable {
                    VerificationStatus::Verified
                } else {
                    VerificationStatus::Unverified
                };
                checked.verification_confidence = result.confidence;
                checked.verification = (!result.raw.is_null()).then(|| result.raw.clone());
                ProspectUpdate {
                    verification_status: Some(status),
                    verification_confidence: result.confidence,
                    verification: checked.verification.clone(),
                    replace_verification: true,
                    ..Default::default()
                }
            }
        };

        let rescored = score_update(ctx, &checked);
        update.score = rescored.score;
        update.score_breakdown = rescored.score_breakdown;

        let target = match update.verification_status {
            Some(VerificationStatus::Verified) => Stage::Verified,
            _ => Stage::Unverified,
        };
        transition::advance(ctx.store.as_ref(), prospect, Transition::Verify, target, update).await
    }
}

#[async_trait]
impl StageHandler for VerifyHandler {
    fn job_type(&self) -> JobType {
        JobType::Verify
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
