//! Prospector event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PipelineEvent`]: the event envelope published on job completion,
//!   job failure, and automation enqueues.
//! - [`EventLog`]: background subscriber that records every event as a
//!   structured log line.

pub mod bus;
pub mod log;

pub use bus::{EventBus, PipelineEvent};
pub use log::EventLog;
