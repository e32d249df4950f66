//! `DRAFTED -> SENT`: one send per prospect, keyed `prospect-{id}`.
//!
//! A prospect with `sent_at` recorded is never sent again, and send is
//! never re-processed. If the stage write after a successful send fails,
//! the next attempt carries the same dedup key.

use async_trait::async_trait;
use chrono::Utc;
use prospector_adapters::types::{dedup_key, OutboundMessage};
use prospector_core::error::CoreError;
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
pub struct SendHandler;

fn message_for(prospect: &Prospect) -> Result<OutboundMessage, CoreError> {
    let missing = |what: &str| CoreError::PreconditionNotMet(format!("send requires {what}"));
    Ok(OutboundMessage {
        to: prospect.contact_email.clone().ok_or_else(|| missing("a contact email"))?,
        subject: prospect.draft_subject.clone().ok_or_else(|| missing("a draft subject"))?,
        body: prospect.draft_body.clone().ok_or_else(|| missing("a draft body"))?,
        dedup_key: dedup_key(prospect.id),
    })
}

#[async_trait]
impl ProspectStep for SendHandler {
    fn transition(&self) -> Transition {
        Transition::Send
    }

    fn precheck(&self, _ctx: &PipelineContext, prospect: &Prospect) -> Result<(), CoreError> {
        if prospect.sent_at.is_some() {
            return Err(CoreError::PreconditionNotMet(format!(
                "prospect {} was already sent",
                prospect.id
            )));
        }
        message_for(prospect).map(|_| ())
    }

    async fn apply(
        &self,
        ctx: &PipelineContext,
        prospect: &Prospect,
        _eligibility: Eligibility,
    ) -> Result<Prospect, PipelineError> {
        let message = message_for(prospect)?;
        let receipt = ctx.adapters.send(&message).await?;
        tracing::info!(
            prospect_id = prospect.id,
            message_id = %receipt.message_id,
            "Outreach sent",
        );
        let update = ProspectUpdate {
            sent_at: Some(Utc::now()),
            sent_message_id: Some(receipt.message_id),
            ..Default::default()
        };
        transition::advance(ctx.store.as_ref(), prospect, Transition::Send, Stage::Sent, update).await
    }
}

#[async_trait]
impl StageHandler for SendHandler {
    fn job_type(&self) -> JobType {
        JobType::Send
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
