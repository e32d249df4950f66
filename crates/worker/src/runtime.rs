//! Wiring shared by the worker binary and the API server.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use prospector_adapters::Adapters;
use prospector_db::{MemoryStore, PgStore, Store, StoreError};
use prospector_events::{EventBus, EventLog};
use prospector_pipeline::PipelineContext;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::automation::AutomationController;
use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::pool::WorkerPool;
use crate::queue::JobQueue;
use crate::scheduler;

/// Connect to Postgres and apply migrations, or fall back to the in-memory
/// store when no URL is configured.
pub async fn connect_store(database_url: Option<&str>) -> Result<Arc<dyn Store>, StoreError> {
    let Some(url) = database_url else {
        tracing::warn!("DATABASE_URL not set, using the in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let pool = prospector_db::create_pool(url).await?;
    tracing::info!("Database connection pool created");
    prospector_db::health_check(&pool).await?;
    prospector_db::run_migrations(&pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("migrations failed: {e}")))?;
    tracing::info!("Database migrations applied");
    Ok(Arc::new(PgStore::new(pool)))
}

/// The long-lived services built on one store.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn Store>,
    pub events: Arc<EventBus>,
    pub queue: Arc<JobQueue>,
    pub automation: Arc<AutomationController>,
    pub pipeline: PipelineContext,
}

impl Services {
    pub fn new(store: Arc<dyn Store>, config: &WorkerConfig) -> Self {
        let events = Arc::new(EventBus::default());
        let queue = Arc::new(JobQueue::new(store.clone(), events.clone()));
        let automation = Arc::new(AutomationController::new(store.clone(), queue.clone()));
        let adapters = Adapters::from_config(&config.adapters).with_timeout(config.adapter_timeout);
        let pipeline = PipelineContext::new(store.clone(), adapters, config.pipeline);
        Self {
            store,
            events,
            queue,
            automation,
            pipeline,
        }
    }

    /// Start the event log, the worker pool, and the scheduler.
    ///
    /// Jobs left `running` by a previous process are failed first; nothing
    /// else would ever finish them.
    pub async fn start_background(&self, config: &WorkerConfig) -> WorkerResult<Background> {
        let recovered = self.queue.recover_abandoned().await?;
        if recovered > 0 {
            tracing::warn!(recovered, "Recovered abandoned jobs");
        }

        let cancel = CancellationToken::new();
        let mut handles = vec![tokio::spawn(EventLog::run(
            self.events.subscribe(),
            cancel.clone(),
        ))];

        let pool = WorkerPool::new(
            self.queue.clone(),
            self.pipeline.clone(),
            config.workers_per_type,
            config.claim_timeout,
        );
        handles.extend(pool.spawn(&cancel));
        handles.push(tokio::spawn(scheduler::run(
            self.automation.clone(),
            config.scheduler_tick,
            cancel.clone(),
        )));

        tracing::info!(tasks = handles.len(), "Background services started");
        Ok(Background { cancel, handles })
    }
}

/// Handles to running background tasks.
pub struct Background {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Background {
    /// Cancel every task and wait up to `timeout` for them to finish.
    pub async fn shutdown(self, timeout: Duration) {
        self.cancel.cancel();
        if tokio::time::timeout(timeout, join_all(self.handles)).await.is_err() {
            tracing::warn!(timeout_secs = timeout.as_secs(), "Background tasks did not stop in time");
        } else {
            tracing::info!("Background services stopped");
        }
    }
}
