//! Event type names published on the event bus for job lifecycle changes.

/// A job finished and its handler returned a summary.
pub const EVENT_JOB_COMPLETED: &str = "job.completed";

/// A job failed (handler error, store failure, or cancellation).
pub const EVENT_JOB_FAILED: &str = "job.failed";

/// The automation controller enqueued a discovery job.
pub const EVENT_AUTOMATION_ENQUEUED: &str = "automation.enqueued";
