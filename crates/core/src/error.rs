use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stage transition was attempted out of order.
    #[error("Precondition not met: {0}")]
    PreconditionNotMet(String),

    /// An atomic write lost a race against a concurrent writer.
    #[error("Concurrent modification of {entity} {id}")]
    ConcurrentModification { entity: &'static str, id: DbId },

    /// Automation was enabled without the fields it needs.
    #[error("Missing configuration: {}", missing_fields.join(", "))]
    MissingConfiguration { missing_fields: Vec<String> },

    #[error("Internal error: {0}")]
    Internal(String),
}
