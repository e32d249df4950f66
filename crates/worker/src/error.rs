use prospector_core::error::CoreError;
use prospector_db::StoreError;

/// Errors from the queue and the automation controller.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type WorkerResult<T> = Result<T, WorkerError>;
