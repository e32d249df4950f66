use axum::routing::get;
use axum::Router;

use crate::handlers::prospects;
use crate::state::AppState;

/// Routes mounted at `/prospects`.
///
/// ```text
/// GET    /                -> list_prospects
/// GET    /{id}            -> get_prospect
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(prospects::list_prospects))
        .route("/{id}", get(prospects::get_prospect))
}
