//! Store traits: the persistence seam shared by the pipeline, the worker,
//! and the API.
//!
//! Two implementations exist: [`crate::pg::PgStore`] over Postgres and
//! [`crate::memory::MemoryStore`] for tests and database-less runs. Every
//! write that can race is a compare-and-swap that reports a lost race as
//! `Ok(None)` / `Ok(false)` rather than an error.

use async_trait::async_trait;
use prospector_core::error::CoreError;
use prospector_core::job::JobType;
use prospector_core::stage::Stage;
use prospector_core::types::DbId;

use crate::models::job::{Job, JobListQuery, NewJob};
use crate::models::prospect::{
    NewProspect, Prospect, ProspectListQuery, StageWrite, UpsertedProspect,
};
use crate::models::scraper_config::ScraperConfig;

/// Maximum page size for listings.
pub const MAX_LIMIT: i64 = 100;

/// Default page size for listings.
pub const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be mapped back onto a domain type.
    #[error("Corrupt row: {0}")]
    Decode(#[from] CoreError),

    /// A write violated a table constraint.
    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Resolve `(limit, offset)` from optional query values.
pub fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

#[async_trait]
pub trait ProspectStore: Send + Sync {
    /// Insert a prospect, or merge into the row with the same domain.
    ///
    /// A merge fills empty columns from `input` and bumps `updated_at`; it
    /// never changes the stage.
    async fn upsert_prospect(&self, input: &NewProspect) -> StoreResult<UpsertedProspect>;

    async fn find_prospect(&self, id: DbId) -> StoreResult<Option<Prospect>>;

    /// Load prospects in the order of `ids`; unknown ids are omitted.
    async fn find_prospects(&self, ids: &[DbId]) -> StoreResult<Vec<Prospect>>;

    /// Prospects in `stage`, ranked `score DESC NULLS LAST, updated_at DESC`.
    async fn eligible_prospects(&self, stage: Stage, limit: i64) -> StoreResult<Vec<Prospect>>;

    /// Paginated listing using the same ranking as eligibility.
    async fn list_prospects(&self, query: &ProspectListQuery) -> StoreResult<Vec<Prospect>>;

    /// Apply a stage write if the stored stage still equals
    /// `write.expected`. Returns `None` when the compare failed.
    async fn write_stage(&self, write: &StageWrite) -> StoreResult<Option<Prospect>>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new `pending` job.
    async fn insert_job(&self, input: &NewJob) -> StoreResult<Job>;

    /// Move the oldest pending job of `job_type` to `running`.
    ///
    /// Returns `None` when nothing is pending, when another claimer won,
    /// or when the head of the queue shares its target set with a job that
    /// is still running.
    async fn claim_next(&self, job_type: JobType) -> StoreResult<Option<Job>>;

    /// `running -> completed`. Returns `false` if the job was not running.
    async fn complete_job(&self, id: DbId, result: &serde_json::Value) -> StoreResult<bool>;

    /// `pending | running -> failed`. Returns `false` if already terminal.
    async fn fail_job(
        &self,
        id: DbId,
        error_message: &str,
        result: Option<&serde_json::Value>,
    ) -> StoreResult<bool>;

    /// Fail every `running` job, returning the jobs it failed.
    ///
    /// Run once at worker startup: a job still `running` then was left by
    /// a process that stopped without finishing it.
    async fn fail_running_jobs(&self, error_message: &str) -> StoreResult<Vec<Job>>;

    async fn find_job(&self, id: DbId) -> StoreResult<Option<Job>>;

    /// Most recent first: `created_at DESC, id DESC`.
    async fn list_jobs(&self, query: &JobListQuery) -> StoreResult<Vec<Job>>;
}

#[async_trait]
pub trait ScraperConfigStore: Send + Sync {
    async fn load_config(&self) -> StoreResult<ScraperConfig>;

    /// Replace the configuration if its version still equals
    /// `expected_version`. The stored version is incremented. Returns
    /// `None` when another writer got there first.
    async fn save_config(
        &self,
        expected_version: i64,
        config: &ScraperConfig,
    ) -> StoreResult<Option<ScraperConfig>>;
}

/// Everything the application needs from persistence.
#[async_trait]
pub trait Store: ProspectStore + JobStore + ScraperConfigStore {
    async fn ping(&self) -> StoreResult<()>;
}
