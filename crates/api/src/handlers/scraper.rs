//! Handlers for the `/scraper` automation endpoints.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use prospector_core::targeting::{parse_set, Interval};
use prospector_worker::ConfigUpdate;
use serde::Deserialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

/// Body of `POST /scraper/config`. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct ScraperConfigRequest {
    pub locations: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub interval: Option<String>,
}

impl ScraperConfigRequest {
    fn into_update(self) -> AppResult<ConfigUpdate> {
        Ok(ConfigUpdate {
            locations: self.locations.as_deref().map(parse_set).transpose()?,
            categories: self.categories.as_deref().map(parse_set).transpose()?,
            interval: self.interval.map(|i| i.parse::<Interval>()).transpose()?,
        })
    }
}

/// GET /api/v1/scraper/status
pub async fn get_status(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let status = state.automation.get_status().await?;
    Ok(Json(DataResponse { data: status }))
}

/// POST /api/v1/scraper/master
pub async fn set_master(
    State(state): State<AppState>,
    Json(input): Json<ToggleRequest>,
) -> AppResult<impl IntoResponse> {
    let status = state.automation.set_master(input.enabled).await?;
    Ok(Json(DataResponse { data: status }))
}

/// POST /api/v1/scraper/automatic
///
/// 422 with `missing_fields` when a configuration field is empty; 409
/// when the master switch is off.
pub async fn set_automatic(
    State(state): State<AppState>,
    Json(input): Json<ToggleRequest>,
) -> AppResult<impl IntoResponse> {
    let status = state.automation.set_auto(input.enabled).await?;
    Ok(Json(DataResponse { data: status }))
}

/// POST /api/v1/scraper/config
pub async fn set_config(
    State(state): State<AppState>,
    Json(input): Json<ScraperConfigRequest>,
) -> AppResult<impl IntoResponse> {
    let status = state.automation.set_config(input.into_update()?).await?;
    Ok(Json(DataResponse { data: status }))
}
