//! Read-only handlers for the `/prospects` resource.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use prospector_core::error::CoreError;
use prospector_db::models::prospect::ProspectListQuery;

use crate::error::{AppError, AppResult};
use crate::handlers::parse_id;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/prospects
///
/// Ranked by `score DESC NULLS LAST, updated_at DESC`. Optional `stage`.
pub async fn list_prospects(
    State(state): State<AppState>,
    Query(params): Query<ProspectListQuery>,
) -> AppResult<impl IntoResponse> {
    let prospects = state.store.list_prospects(&params).await?;
    Ok(Json(DataResponse { data: prospects }))
}

/// GET /api/v1/prospects/{id}
pub async fn get_prospect(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = parse_id("prospect", &id)?;
    let prospect = state
        .store
        .find_prospect(id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Prospect",
            id,
        }))?;
    Ok(Json(DataResponse { data: prospect }))
}
