//! Repository for the `jobs` table.
//!
//! Status literals always come from `JobStatus::as_str`, never inline.

use prospector_core::job::{JobStatus, JobType};
use prospector_core::types::DbId;
use sqlx::PgPool;

use crate::models::job::{target_key, Job, JobListQuery, JobRow, NewJob};
use crate::store::{page, StoreResult};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, job_type, status, origin, target_ids, parameters, result, \
    error_message, retry_of_job_id, claimed_at, completed_at, \
    created_at, updated_at";

/// Partial unique index allowing one running job per type and target set
/// (compared through the sorted `target_key` column).
const RUNNING_TARGET_INDEX: &str = "uq_jobs_running_target";

/// Provides persistence for background jobs.
pub struct JobRepo;

impl JobRepo {
    /// Create a new pending job.
    pub async fn insert(pool: &PgPool, input: &NewJob) -> StoreResult<Job> {
        let query = format!(
            "INSERT INTO jobs \
                 (job_type, status, origin, target_ids, target_key, parameters, retry_of_job_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(input.job_type.as_str())
            .bind(JobStatus::Pending.as_str())
            .bind(input.origin.as_str())
            .bind(&input.target_ids)
            .bind(target_key(&input.target_ids))
            .bind(input.parameters.to_json())
            .bind(input.retry_of_job_id)
            .fetch_one(pool)
            .await?;
        Ok(row.try_into()?)
    }

    /// Atomically claim the oldest pending job of one type.
    ///
    /// `FOR UPDATE SKIP LOCKED` keeps concurrent claimers off the same row.
    /// The head of the queue waits while a job with the same target set is
    /// running; if two claimers still race past that check the unique index
    /// rejects one of them, which is reported as "nothing claimed".
    pub async fn claim_next(pool: &PgPool, job_type: JobType) -> StoreResult<Option<Job>> {
        let query = format!(
            "UPDATE jobs \
             SET status = $2, claimed_at = NOW(), updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM jobs \
                 WHERE job_type = $1 AND status = $3 \
                 ORDER BY created_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             AND status = $3 \
             AND NOT EXISTS ( \
                 SELECT 1 FROM jobs r \
                 WHERE r.job_type = $1 AND r.status = $2 AND r.target_key = jobs.target_key \
             ) \
             RETURNING {COLUMNS}"
        );
        let result = sqlx::query_as::<_, JobRow>(&query)
            .bind(job_type.as_str())
            .bind(JobStatus::Running.as_str())
            .bind(JobStatus::Pending.as_str())
            .fetch_optional(pool)
            .await;

        match result {
            Ok(row) => Ok(row.map(Job::try_from).transpose()?),
            Err(err) if super::unique_violation(&err).as_deref() == Some(RUNNING_TARGET_INDEX) => {
                tracing::debug!(job_type = %job_type, "Claim lost to a concurrent claimer");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Mark a running job as completed with its result summary.
    pub async fn complete(
        pool: &PgPool,
        job_id: DbId,
        result: &serde_json::Value,
    ) -> StoreResult<bool> {
        let done = sqlx::query(
            "UPDATE jobs \
             SET status = $2, result = $3, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status = $4",
        )
        .bind(job_id)
        .bind(JobStatus::Completed.as_str())
        .bind(result)
        .bind(JobStatus::Running.as_str())
        .execute(pool)
        .await?;
        Ok(done.rows_affected() > 0)
    }

    /// Mark a non-terminal job as failed.
    ///
    /// No automatic retry is performed. A failed job stays failed until an
    /// operator retries it, which creates a new job.
    pub async fn fail(
        pool: &PgPool,
        job_id: DbId,
        error: &str,
        result: Option<&serde_json::Value>,
    ) -> StoreResult<bool> {
        let done = sqlx::query(
            "UPDATE jobs \
             SET status = $2, error_message = $3, result = COALESCE($4, result), \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status IN ($5, $6)",
        )
        .bind(job_id)
        .bind(JobStatus::Failed.as_str())
        .bind(error)
        .bind(result)
        .bind(JobStatus::Pending.as_str())
        .bind(JobStatus::Running.as_str())
        .execute(pool)
        .await?;
        Ok(done.rows_affected() > 0)
    }

    /// Fail every running job in one statement.
    pub async fn fail_running(pool: &PgPool, error: &str) -> StoreResult<Vec<Job>> {
        let query = format!(
            "UPDATE jobs \
             SET status = $1, error_message = $2, completed_at = NOW(), updated_at = NOW() \
             WHERE status = $3 \
             RETURNING {COLUMNS}"
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(JobStatus::Failed.as_str())
            .bind(error)
            .bind(JobStatus::Running.as_str())
            .fetch_all(pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(Job::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> StoreResult<Option<Job>> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(Job::try_from).transpose()?)
    }

    /// List jobs with optional type/status filters, most recent first.
    pub async fn list(pool: &PgPool, params: &JobListQuery) -> StoreResult<Vec<Job>> {
        let (limit, offset) = page(params.limit, params.offset);

        // Build the WHERE clause and track the next bind parameter index.
        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if params.job_type.is_some() {
            conditions.push(format!("job_type = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.status.is_some() {
            conditions.push(format!("status = ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             {where_clause} \
             ORDER BY created_at DESC, id DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );

        let mut q = sqlx::query_as::<_, JobRow>(&query);
        if let Some(job_type) = params.job_type {
            q = q.bind(job_type.as_str());
        }
        if let Some(status) = params.status {
            q = q.bind(status.as_str());
        }
        let rows = q.bind(limit).bind(offset).fetch_all(pool).await?;

        Ok(rows
            .into_iter()
            .map(Job::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }
}
