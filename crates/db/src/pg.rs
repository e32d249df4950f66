//! Postgres-backed [`Store`], delegating to the repositories.

use async_trait::async_trait;
use prospector_core::job::JobType;
use prospector_core::stage::Stage;
use prospector_core::types::DbId;
use sqlx::PgPool;

use crate::models::job::{Job, JobListQuery, NewJob};
use crate::models::prospect::{
    NewProspect, Prospect, ProspectListQuery, StageWrite, UpsertedProspect,
};
use crate::models::scraper_config::ScraperConfig;
use crate::repositories::{JobRepo, ProspectRepo, ScraperConfigRepo};
use crate::store::{JobStore, ProspectStore, ScraperConfigStore, Store, StoreResult};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ProspectStore for PgStore {
    async fn upsert_prospect(&self, input: &NewProspect) -> StoreResult<UpsertedProspect> {
        ProspectRepo::upsert(&self.pool, input).await
    }

    async fn find_prospect(&self, id: DbId) -> StoreResult<Option<Prospect>> {
        ProspectRepo::find_by_id(&self.pool, id).await
    }

    async fn find_prospects(&self, ids: &[DbId]) -> StoreResult<Vec<Prospect>> {
        ProspectRepo::find_by_ids(&self.pool, ids).await
    }

    async fn eligible_prospects(&self, stage: Stage, limit: i64) -> StoreResult<Vec<Prospect>> {
        ProspectRepo::list_in_stage(&self.pool, stage, limit).await
    }

    async fn list_prospects(&self, query: &ProspectListQuery) -> StoreResult<Vec<Prospect>> {
        ProspectRepo::list(&self.pool, query).await
    }

    async fn write_stage(&self, write: &StageWrite) -> StoreResult<Option<Prospect>> {
        ProspectRepo::write_stage(&self.pool, write).await
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn insert_job(&self, input: &NewJob) -> StoreResult<Job> {
        JobRepo::insert(&self.pool, input).await
    }

    async fn claim_next(&self, job_type: JobType) -> StoreResult<Option<Job>> {
        JobRepo::claim_next(&self.pool, job_type).await
    }

    async fn complete_job(&self, id: DbId, result: &serde_json::Value) -> StoreResult<bool> {
        JobRepo::complete(&self.pool, id, result).await
    }

    async fn fail_job(
        &self,
        id: DbId,
        error_message: &str,
        result: Option<&serde_json::Value>,
    ) -> StoreResult<bool> {
        JobRepo::fail(&self.pool, id, error_message, result).await
    }

    async fn fail_running_jobs(&self, error_message: &str) -> StoreResult<Vec<Job>> {
        JobRepo::fail_running(&self.pool, error_message).await
    }

    async fn find_job(&self, id: DbId) -> StoreResult<Option<Job>> {
        JobRepo::find_by_id(&self.pool, id).await
    }

    async fn list_jobs(&self, query: &JobListQuery) -> StoreResult<Vec<Job>> {
        JobRepo::list(&self.pool, query).await
    }
}

#[async_trait]
impl ScraperConfigStore for PgStore {
    async fn load_config(&self) -> StoreResult<ScraperConfig> {
        ScraperConfigRepo::load(&self.pool).await
    }

    async fn save_config(
        &self,
        expected_version: i64,
        config: &ScraperConfig,
    ) -> StoreResult<Option<ScraperConfig>> {
        ScraperConfigRepo::save(&self.pool, expected_version, config).await
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }
}
