use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use prospector_core::error::CoreError;
use prospector_db::StoreError;
use prospector_worker::WorkerError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`StoreError`] for
/// persistence failures. Implements [`IntoResponse`] to produce consistent
/// `{ "error", "code" }` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<WorkerError> for AppError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::Core(e) => AppError::Core(e),
            WorkerError::Store(e) => AppError::Store(e),
        }
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut missing_fields = None;

        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::PreconditionNotMet(msg) => {
                    (StatusCode::CONFLICT, "PRECONDITION_NOT_MET", msg.clone())
                }
                CoreError::ConcurrentModification { .. } => (
                    StatusCode::CONFLICT,
                    "CONCURRENT_MODIFICATION",
                    core.to_string(),
                ),
                CoreError::MissingConfiguration { missing_fields: fields } => {
                    missing_fields = Some(fields.clone());
                    (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "MISSING_CONFIGURATION",
                        core.to_string(),
                    )
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
            },

            // --- Store errors ---
            AppError::Store(err) => match err {
                StoreError::Constraint(name) => (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    format!("Write violates constraint: {name}"),
                ),
                StoreError::Unavailable(msg) => {
                    tracing::error!(error = %msg, "Store unavailable");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "STORE_UNAVAILABLE",
                        "The store is unavailable".to_string(),
                    )
                }
                StoreError::Database(_) | StoreError::Decode(_) => {
                    tracing::error!(error = %err, "Store error");
                    internal()
                }
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(fields) = missing_fields {
            body["missing_fields"] = json!(fields);
        }

        (status, axum::Json(body)).into_response()
    }
}
