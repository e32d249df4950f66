//! Automation controller: the only writer of the scraper configuration.
//!
//! Every mutation is a read-modify-write that compares on `version`,
//! retried a bounded number of times when another writer gets in first.
//! The can-enable predicate is evaluated on every read.

use std::sync::Arc;

use chrono::Utc;
use prospector_core::automation::{derive_status, is_due, next_run_after, AutomationStatus};
use prospector_core::error::CoreError;
use prospector_core::job::{JobOrigin, JobParameters, JobStatus, JobType};
use prospector_core::job_events::EVENT_AUTOMATION_ENQUEUED;
use prospector_core::targeting::{Category, Interval, Location};
use prospector_core::types::{DbId, Timestamp};
use prospector_db::models::job::{Job, NewJob};
use prospector_db::models::scraper_config::ScraperConfig;
use prospector_db::Store;
use prospector_events::PipelineEvent;
use serde::Serialize;

use crate::error::{WorkerError, WorkerResult};
use crate::queue::JobQueue;

/// Attempts at a compare-and-swap write before giving up.
const MAX_CAS_ATTEMPTS: usize = 5;

/// Id reported in a lost-race error for the singleton record.
const CONFIG_ID: DbId = 1;

/// Automation state as shown to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutomationSnapshot {
    pub master_enabled: bool,
    /// Effective value: the stored flag only while its preconditions hold.
    pub auto_enabled: bool,
    pub locations: Vec<Location>,
    pub categories: Vec<Category>,
    pub interval: Option<Interval>,
    pub next_run_at: Option<Timestamp>,
    pub last_run_at: Option<Timestamp>,
    pub last_job_id: Option<DbId>,
    pub status: AutomationStatus,
    pub can_enable_auto: bool,
    pub missing_fields: Vec<String>,
    pub version: i64,
}

/// Partial configuration update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigUpdate {
    pub locations: Option<Vec<Location>>,
    pub categories: Option<Vec<Category>>,
    pub interval: Option<Interval>,
}

pub struct AutomationController {
    store: Arc<dyn Store>,
    queue: Arc<JobQueue>,
}

impl AutomationController {
    pub fn new(store: Arc<dyn Store>, queue: Arc<JobQueue>) -> Self {
        Self { store, queue }
    }

    pub async fn get_status(&self) -> WorkerResult<AutomationSnapshot> {
        let config = self.store.load_config().await?;
        self.snapshot(config).await
    }

    /// Turn the master switch on or off. Turning it off also clears the
    /// automatic switch and the schedule.
    pub async fn set_master(&self, enabled: bool) -> WorkerResult<AutomationSnapshot> {
        let config = self
            .mutate(|cfg| {
                cfg.master_enabled = enabled;
                if !enabled {
                    cfg.auto_enabled = false;
                    cfg.next_run_at = None;
                }
                Ok(())
            })
            .await?;
        tracing::info!(enabled, "Automation master switch set");
        self.snapshot(config).await
    }

    /// Turn the automatic switch on or off.
    ///
    /// Enabling needs every configuration field (else
    /// [`CoreError::MissingConfiguration`]) and the master switch (else
    /// [`CoreError::Conflict`]). The first run is due immediately.
    pub async fn set_auto(&self, enabled: bool) -> WorkerResult<AutomationSnapshot> {
        let now = Utc::now();
        let config = self
            .mutate(|cfg| {
                if !enabled {
                    cfg.auto_enabled = false;
                    cfg.next_run_at = None;
                    return Ok(());
                }
                let missing_fields = cfg.fields().missing_fields();
                if !missing_fields.is_empty() {
                    return Err(CoreError::MissingConfiguration { missing_fields });
                }
                if !cfg.master_enabled {
                    return Err(CoreError::Conflict(
                        "automation requires the master switch to be on".into(),
                    ));
                }
                if !cfg.auto_enabled || cfg.next_run_at.is_none() {
                    cfg.next_run_at = Some(now);
                }
                cfg.auto_enabled = true;
                Ok(())
            })
            .await?;
        tracing::info!(enabled, "Automation switch set");
        self.snapshot(config).await
    }

    /// Replace the targeting fields that are present in `update`.
    ///
    /// Leaving a field empty while automation is on turns automation off.
    /// Changing the interval reschedules the next run from the last one.
    pub async fn set_config(&self, update: ConfigUpdate) -> WorkerResult<AutomationSnapshot> {
        let now = Utc::now();
        let config = self
            .mutate(|cfg| {
                let interval_changed = update.interval.is_some_and(|i| cfg.interval != Some(i));
                if let Some(locations) = &update.locations {
                    cfg.locations = locations.clone();
                }
                if let Some(categories) = &update.categories {
                    cfg.categories = categories.clone();
                }
                if let Some(interval) = update.interval {
                    cfg.interval = Some(interval);
                }

                if cfg.auto_enabled && !cfg.fields().missing_fields().is_empty() {
                    cfg.auto_enabled = false;
                    cfg.next_run_at = None;
                } else if cfg.auto_enabled && interval_changed {
                    if let Some(interval) = cfg.interval {
                        let from = cfg.last_run_at.unwrap_or(now);
                        cfg.next_run_at = Some(next_run_after(from, interval).max(now));
                    }
                }
                Ok(())
            })
            .await?;
        tracing::info!(
            locations = config.locations.len(),
            categories = config.categories.len(),
            interval = ?config.interval.map(|i| i.as_str()),
            "Automation configuration updated",
        );
        self.snapshot(config).await
    }

    /// One scheduler cycle.
    ///
    /// When automation is effectively on and the next run is due, claim
    /// the slot by advancing `next_run_at` (only one replica wins), then
    /// enqueue a discover job unless the previous one is still active.
    pub async fn tick(&self, now: Timestamp) -> WorkerResult<Option<Job>> {
        let config = self.store.load_config().await?;
        if !config.effective_auto() || !is_due(config.next_run_at, now) {
            return Ok(None);
        }
        let Some(interval) = config.interval else {
            return Ok(None);
        };

        let busy = match config.last_job_id {
            Some(id) => self
                .store
                .find_job(id)
                .await?
                .is_some_and(|job| !job.status.is_terminal()),
            None => false,
        };

        let mut claimed = config.clone();
        claimed.next_run_at = Some(next_run_after(now, interval));
        claimed.updated_at = Utc::now();
        if !busy {
            claimed.last_run_at = Some(now);
        }
        let Some(claimed) = self.store.save_config(config.version, &claimed).await? else {
            tracing::debug!("Automation slot taken by another scheduler");
            return Ok(None);
        };

        if busy {
            tracing::info!(
                last_job_id = ?config.last_job_id,
                next_run_at = ?claimed.next_run_at,
                "Previous automation job still active, skipping run",
            );
            return Ok(None);
        }

        let parameters = JobParameters {
            locations: claimed.locations.clone(),
            categories: claimed.categories.clone(),
            ..Default::default()
        };
        let job = self
            .queue
            .enqueue(
                NewJob::manual(JobType::Discover, Vec::new())
                    .with_origin(JobOrigin::Automation)
                    .with_parameters(parameters),
            )
            .await?;

        let job_id = job.id;
        self.mutate(|cfg| {
            cfg.last_job_id = Some(job_id);
            Ok(())
        })
        .await?;

        tracing::info!(job_id, next_run_at = ?claimed.next_run_at, "Automation enqueued discovery");
        self.queue.events().publish(
            PipelineEvent::new(EVENT_AUTOMATION_ENQUEUED)
                .with_job(job_id, JobType::Discover)
                .with_payload(serde_json::json!({ "next_run_at": claimed.next_run_at })),
        );
        Ok(Some(job))
    }

    /// Apply `change` to a fresh read and write it back on the same
    /// version, retrying on conflict.
    async fn mutate<F>(&self, mut change: F) -> WorkerResult<ScraperConfig>
    where
        F: FnMut(&mut ScraperConfig) -> Result<(), CoreError>,
    {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self.store.load_config().await?;
            let mut next = current.clone();
            change(&mut next)?;
            next.updated_at = Utc::now();
            if let Some(saved) = self.store.save_config(current.version, &next).await? {
                return Ok(saved);
            }
            tracing::debug!(attempt, version = current.version, "Config write lost a race, retrying");
        }
        Err(WorkerError::Core(CoreError::ConcurrentModification {
            entity: "scraper_config",
            id: CONFIG_ID,
        }))
    }

    async fn snapshot(&self, config: ScraperConfig) -> WorkerResult<AutomationSnapshot> {
        let running = match config.last_job_id {
            Some(id) => self
                .store
                .find_job(id)
                .await?
                .is_some_and(|job| job.status == JobStatus::Running),
            None => false,
        };
        let fields = config.fields();
        let missing_fields = fields.missing_fields();
        let can_enable_auto = fields.can_enable_auto();
        let auto_enabled = config.effective_auto();
        Ok(AutomationSnapshot {
            status: derive_status(config.master_enabled, running),
            master_enabled: config.master_enabled,
            auto_enabled,
            next_run_at: if auto_enabled { config.next_run_at } else { None },
            locations: config.locations,
            categories: config.categories,
            interval: config.interval,
            last_run_at: config.last_run_at,
            last_job_id: config.last_job_id,
            can_enable_auto,
            missing_fields,
            version: config.version,
        })
    }
}
