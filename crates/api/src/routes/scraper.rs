use axum::routing::{get, post};
use axum::Router;

use crate::handlers::scraper;
use crate::state::AppState;

/// Routes mounted at `/scraper`.
///
/// ```text
/// GET    /status          -> get_status
/// POST   /master          -> set_master
/// POST   /automatic       -> set_automatic
/// POST   /config          -> set_config
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(scraper::get_status))
        .route("/master", post(scraper::set_master))
        .route("/automatic", post(scraper::set_automatic))
        .route("/config", post(scraper::set_config))
}
