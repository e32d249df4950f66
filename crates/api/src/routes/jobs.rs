use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                -> list_jobs
/// GET    /{id}            -> get_job
/// POST   /{job_type}      -> enqueue_job
/// POST   /{id}/retry      -> retry_job
/// ```
///
/// `GET /{id}` and `POST /{job_type}` share one path segment.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs))
        .route("/{key}", get(jobs::get_job).post(jobs::enqueue_job))
        .route("/{key}/retry", post(jobs::retry_job))
}
