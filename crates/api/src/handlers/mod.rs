use prospector_core::types::DbId;

use crate::error::{AppError, AppResult};

pub mod jobs;
pub mod prospects;
pub mod scraper;

/// Parse an `{id}` path segment. Extracting `Path<DbId>` directly would
/// answer a malformed id with axum's plain-text rejection.
pub(crate) fn parse_id(entity: &str, raw: &str) -> AppResult<DbId> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid {entity} id: '{raw}'")))
}
