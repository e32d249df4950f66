//! Prospector domain core.
//!
//! Zero internal dependencies: stage and job vocabularies, the scoring
//! engine, targeting enums, and the automation predicates shared by every
//! other crate in the workspace.

#[macro_use]
mod macros;

pub mod automation;
pub mod error;
pub mod job;
pub mod job_events;
pub mod scoring;
pub mod stage;
pub mod targeting;
pub mod types;
