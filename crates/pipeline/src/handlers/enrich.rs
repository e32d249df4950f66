//! `SCRAPED -> ENRICHED`: one SEO metrics lookup per prospect.

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
pub struct EnrichHandler;

#[async_trait]
impl ProspectStep for EnrichHandler {
    fn transition(&self) -> Transition {
        Transition::Enrich
    }

    async fn apply(
        &self,
        ctx: &PipelineContext,
        prospect: &Prospect,
        _eligibility: Eligibility,
    ) -> Result<Prospect, PipelineError> {
        let metrics = ctx.adapters.metrics(&prospect.domain).await?;
        let update = ProspectUpdate {
            domain_authority: metrics.domain_authority,
            backlinks: metrics.backlinks,
            metrics: (!metrics.raw.is_null()).then_some(metrics.raw),
            ..Default::default()
        };
        transition::advance(ctx.store.as_ref(), prospect, Transition::Enrich, Stage::Enriched, update)
            .await
    }
}

#[async_trait]
impl StageHandler for EnrichHandler {
    fn job_type(&self) -> JobType {
        JobType::Enrich
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
