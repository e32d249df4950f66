//! Handlers for the `/jobs` resource.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use prospector_core::job::{JobParameters, JobType};
use prospector_core::targeting::parse_set;
use prospector_core::types::DbId;
use prospector_db::models::job::{JobListQuery, NewJob};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::handlers::parse_id;
use crate::response::DataResponse;
use crate::state::AppState;

/// Optional body of `POST /jobs/{job_type}`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnqueueJobRequest {
    #[serde(default)]
    pub target_ids: Vec<DbId>,
    #[serde(default)]
    pub reprocess: bool,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl EnqueueJobRequest {
    /// Parse a possibly empty JSON body.
    fn from_body(body: &[u8]) -> AppResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid body: {e}")))
    }

    fn into_new_job(self, job_type: JobType) -> AppResult<NewJob> {
        let parameters = JobParameters {
            reprocess: self.reprocess,
            locations: parse_set(&self.locations)?,
            categories: parse_set(&self.categories)?,
        };
        Ok(NewJob::manual(job_type, self.target_ids).with_parameters(parameters))
    }
}

// ---------------------------------------------------------------------------
// Enqueue
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{job_type}
///
/// Enqueue a job of the given type. Returns 201 with the pending job.
pub async fn enqueue_job(
    State(state): State<AppState>,
    Path(job_type): Path<String>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let job_type: JobType = job_type.parse()?;
    let input = EnqueueJobRequest::from_body(&body)?.into_new_job(job_type)?;
    let job = state.queue.enqueue(input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// List / get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// Most recent first. Supports `job_type`, `status`, `limit`, `offset`.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = state.queue.list(&params).await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = state.queue.get(parse_id("job", &job_id)?).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/retry
///
/// Enqueue a copy of a failed job. 409 unless the job failed.
pub async fn retry_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = state.queue.retry(parse_id("job", &job_id)?).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}
