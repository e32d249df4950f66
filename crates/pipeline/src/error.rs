use prospector_adapters::AdapterError;
use prospector_core::error::CoreError;
use prospector_core::types::DbId;
use prospector_db::models::prospect::Prospect;
use prospector_db::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Precondition, validation, or missing-configuration failures.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("External service error: {0}")]
    External(#[from] AdapterError),

    /// A stage write lost its compare-and-swap. `winner` is the row as the
    /// other writer left it.
    #[error("Concurrent modification of prospect {prospect_id}")]
    ConcurrentModification {
        prospect_id: DbId,
        winner: Option<Box<Prospect>>,
    },

    /// The store is unreachable or returned an unexpected error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Job cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Errors that abort the whole job instead of one prospect.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Store(_) | PipelineError::Cancelled)
    }
}
