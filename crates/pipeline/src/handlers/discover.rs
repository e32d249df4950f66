//! Discovery: search, upsert by domain, then `DISCOVERED -> SCRAPED`.
//!
//! With explicit targets the job only applies the scrape transition to
//! those prospects.

use async_trait::async_trait;
use prospector_adapters::types::{domain_of, DiscoveryHit, DiscoveryQuery};
use prospector_core::automation::{FIELD_CATEGORIES, FIELD_LOCATIONS};
use prospector_core::error::CoreError;
use prospector_core::job::{JobSummary, JobType};
use prospector_core::stage::{Eligibility, Stage, Transition};
use prospector_core::targeting::{Category, Location};
use prospector_db::models::job::Job;
use prospector_db::models::prospect::{NewProspect, Prospect, ProspectUpdate};
use tokio_util::sync::CancellationToken;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::handler::{record_failure, run_transition, ProspectStep, StageHandler};
use crate::transition;

#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoverHandler;

/// The scrape transition on its own, used for explicitly targeted jobs
/// and for each prospect a search produced.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ScrapeStep;

#[async_trait]
impl ProspectStep for ScrapeStep {
    fn transition(&self) -> Transition {
        Transition::Scrape
    }

    async fn apply(
        &self,
        ctx: &PipelineContext,
        prospect: &Prospect,
        _eligibility: Eligibility,
    ) -> Result<Prospect, PipelineError> {
        scrape(ctx, prospect, None).await
    }
}

/// Advance a `DISCOVERED` prospect, writing whatever page data the hit
/// carried.
async fn scrape(
    ctx: &PipelineContext,
    prospect: &Prospect,
    hit: Option<&DiscoveryHit>,
) -> Result<Prospect, PipelineError> {
    let update = ProspectUpdate {
        title: hit.and_then(|h| h.title.clone()).filter(|t| !t.trim().is_empty()),
        contact_email: hit
            .and_then(|h| h.contact_email.clone())
            .filter(|e| !e.trim().is_empty()),
        ..Default::default()
    };
    transition::advance(ctx.store.as_ref(), prospect, Transition::Scrape, Stage::Scraped, update)
        .await
}

/// Discovery scope: the job's parameters, else the automation config.
async fn resolve_scope(
    ctx: &PipelineContext,
    job: &Job,
) -> Result<(Vec<Location>, Vec<Category>), PipelineError> {
    let mut locations = job.parameters.locations.clone();
    let mut categories = job.parameters.categories.clone();
    if locations.is_empty() || categories.is_empty() {
        let config = ctx.store.load_config().await?;
        if locations.is_empty() {
            locations = config.locations;
        }
        if categories.is_empty() {
            categories = config.categories;
        }
    }

    let mut missing = Vec::new();
    if locations.is_empty() {
        missing.push(FIELD_LOCATIONS.to_string());
    }
    if categories.is_empty() {
        missing.push(FIELD_CATEGORIES.to_string());
    }
    if !missing.is_empty() {
        return Err(CoreError::MissingConfiguration { missing_fields: missing }.into());
    }
    Ok((locations, categories))
}

impl DiscoverHandler {
    async fn search_and_upsert(
        &self,
        ctx: &PipelineContext,
        job: &Job,
        cancel: &CancellationToken,
    ) -> Result<JobSummary, PipelineError> {
        let (locations, categories) = resolve_scope(ctx, job).await?;
        let mut summary = JobSummary::default();

        for &location in &locations {
            for &category in &categories {
                if cancel.is_cancelled() {
                    return Err(PipelineError::Cancelled);
                }
                let query = DiscoveryQuery {
                    location,
                    category,
                    limit: ctx.settings.discovery_limit,
                };
                let searched = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(PipelineError::Cancelled),
                    searched = ctx.adapters.search(&query) => searched,
                };
                let hits = match searched {
                    Ok(hits) => hits,
                    Err(e) => {
                        tracing::warn!(
                            job_id = job.id,
                            %location,
                            %category,
                            error = %e,
                            "Discovery search failed",
                        );
                        summary.failed(None, format!("search {location}/{category}: {e}"));
                        continue;
                    }
                };
                tracing::info!(job_id = job.id, %location, %category, hits = hits.len(), "Discovery search");

                for hit in &hits {
                    if cancel.is_cancelled() {
                        return Err(PipelineError::Cancelled);
                    }
                    self.ingest(ctx, job, location, category, hit, &mut summary).await?;
                }
            }
        }
        Ok(summary)
    }

    async fn ingest(
        &self,
        ctx: &PipelineContext,
        job: &Job,
        location: Location,
        category: Category,
        hit: &DiscoveryHit,
        summary: &mut JobSummary,
    ) -> Result<(), PipelineError> {
        let Some(domain) = domain_of(&hit.url) else {
            summary.failed(None, format!("no domain in {}", hit.url));
            return Ok(());
        };
        let upserted = ctx
            .store
            .upsert_prospect(&NewProspect {
                url: hit.url.clone(),
                domain,
                title: hit.title.clone(),
                category: Some(category),
                location: Some(location),
                contact_email: hit.contact_email.clone(),
            })
            .await?;
        let prospect = upserted.prospect;

        if upserted.created {
            summary.created += 1;
        } else if prospect.stage != Stage::Discovered {
            summary.skipped(prospect.id, "merged into existing prospect");
            return Ok(());
        }

        match scrape(ctx, &prospect, Some(hit)).await {
            Ok(_) => summary.succeeded(prospect.id),
            Err(e) => record_failure(ctx, job, &prospect, e, summary).await?,
        }
        Ok(())
    }
}

#[async_trait]
impl StageHandler for DiscoverHandler {
    fn job_type(&self) -> JobType {
        JobType::Discover
    }

    async fn run(
        &self,
        ctx: &PipelineContext,
        job: &Job,
        cancel: &CancellationToken,
    ) -> Result<JobSummary, PipelineError> {
        if job.target_ids.is_empty() {
            self.search_and_upsert(ctx, job, cancel).await
        } else {
            run_transition(&ScrapeStep, ctx, job, cancel).await
        }
    }
}
