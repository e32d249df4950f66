mod discover;
mod draft;
mod enrich;
mod score;
mod send;
mod verify;

pub use discover::DiscoverHandler;
pub use draft::DraftHandler;
pub use enrich::EnrichHandler;
pub use score::ScoreHandler;
pub use send::SendHandler;
pub use verify::VerifyHandler;

use prospector_core::job::{JobSummary, JobType};
use prospector_db::models::job::Job;
use tokio_util::sync::CancellationToken;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::handler::StageHandler;

/// The handler for a job type.
pub fn handler_for(job_type: JobType) -> &'static dyn StageHandler {
    match job_type {
        JobType::Discover => &DiscoverHandler,
        JobType::Enrich => &EnrichHandler,
        JobType::Score => &ScoreHandler,
        JobType::Verify => &VerifyHandler,
        JobType::Draft => &DraftHandler,
        JobType::Send => &SendHandler,
    }
}

/// Run `job` with the handler for its type.
pub async fn run_job(
    ctx: &PipelineContext,
    job: &Job,
    cancel: &CancellationToken,
) -> Result<JobSummary, PipelineError> {
    handler_for(job.job_type).run(ctx, job, cancel).await
}
