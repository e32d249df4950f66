//! Job entity models and DTOs.

use prospector_core::error::CoreError;
use prospector_core::job::{JobOrigin, JobParameters, JobStatus, JobType};
use prospector_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A unit of background work applying one transition to a batch of prospects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: DbId,
    pub job_type: JobType,
    pub status: JobStatus,
    pub origin: JobOrigin,
    /// Ordered prospect ids. Empty means "all eligible".
    pub target_ids: Vec<DbId>,
    pub parameters: JobParameters,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub retry_of_job_id: Option<DbId>,
    pub claimed_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: DbId,
    pub job_type: String,
    pub status: String,
    pub origin: String,
    pub target_ids: Vec<DbId>,
    pub parameters: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub retry_of_job_id: Option<DbId>,
    pub claimed_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<JobRow> for Job {
    type Error = CoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            job_type: row.job_type.parse()?,
            status: row.status.parse()?,
            origin: row.origin.parse()?,
            target_ids: row.target_ids,
            parameters: JobParameters::from_json(&row.parameters),
            result: row.result,
            error_message: row.error_message,
            retry_of_job_id: row.retry_of_job_id,
            claimed_at: row.claimed_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// DTO for enqueueing a job.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub job_type: JobType,
    pub origin: JobOrigin,
    pub target_ids: Vec<DbId>,
    pub parameters: JobParameters,
    pub retry_of_job_id: Option<DbId>,
}

impl NewJob {
    /// A manually requested job with no parameters.
    pub fn manual(job_type: JobType, target_ids: Vec<DbId>) -> Self {
        Self {
            job_type,
            origin: JobOrigin::Manual,
            target_ids: dedup_targets(target_ids),
            parameters: JobParameters::default(),
            retry_of_job_id: None,
        }
    }

    pub fn with_origin(mut self, origin: JobOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_parameters(mut self, parameters: JobParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// A retry of `failed`, copying its type, targets and parameters.
    pub fn retry_of(failed: &Job) -> Self {
        Self {
            job_type: failed.job_type,
            origin: JobOrigin::Retry,
            target_ids: failed.target_ids.clone(),
            parameters: failed.parameters.clone(),
            retry_of_job_id: Some(failed.id),
        }
    }
}

/// Drop repeated ids, keeping first-seen order.
pub fn dedup_targets(ids: Vec<DbId>) -> Vec<DbId> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// Order-independent identity of a target set: sorted, without repeats.
///
/// Two jobs whose targets hold the same ids in any order share a key, and
/// at most one job per type and key may be running.
pub fn target_key(ids: &[DbId]) -> Vec<DbId> {
    let mut key = ids.to_vec();
    key.sort_unstable();
    key.dedup();
    key
}

/// Query parameters for `GET /api/v1/jobs`.
#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    pub job_type: Option<JobType>,
    pub status: Option<JobStatus>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}
