//! Stage handlers: the work each job type performs against prospects.

pub mod context;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod transition;

pub use context::{PipelineContext, PipelineSettings};
pub use error::PipelineError;
pub use handler::StageHandler;
pub use handlers::{handler_for, run_job};
