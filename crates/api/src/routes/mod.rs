pub mod health;
pub mod jobs;
pub mod prospects;
pub mod scraper;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /jobs                                  list
/// /jobs/{job_type}                       enqueue (POST)
/// /jobs/{id}                             get
/// /jobs/{id}/retry                       retry a failed job (POST)
///
/// /scraper/status                        automation status
/// /scraper/master                        master switch (POST)
/// /scraper/automatic                     automatic switch (POST)
/// /scraper/config                        targeting and interval (POST)
///
/// /prospects                             ranked list
/// /prospects/{id}                        get
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .nest("/scraper", scraper::router())
        .nest("/prospects", prospects::router())
}
