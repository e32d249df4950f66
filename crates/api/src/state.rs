use std::sync::Arc;

use prospector_db::Store;
use prospector_worker::{AutomationController, JobQueue, Services};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Prospect reads and health checks.
    pub store: Arc<dyn Store>,
    /// Job enqueue, lookup, and retry.
    pub queue: Arc<JobQueue>,
    /// Scraper configuration reads and writes.
    pub automation: Arc<AutomationController>,
}

impl AppState {
    pub fn new(config: ServerConfig, services: &Services) -> Self {
        Self {
            config: Arc::new(config),
            store: services.store.clone(),
            queue: services.queue.clone(),
            automation: services.automation.clone(),
        }
    }
}
