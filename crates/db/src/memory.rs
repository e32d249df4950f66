//! In-memory [`Store`] for tests and runs without `DATABASE_URL`.
//!
//! One `tokio::sync::Mutex` guards all state, so each trait method is
//! atomic in the same way a single SQL statement is. The table constraints
//! from `db/migrations` that the pipeline relies on are checked here too.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use prospector_core::job::{JobStatus, JobType};
use prospector_core::stage::{Stage, VerificationStatus};
use prospector_core::types::{DbId, Timestamp};
use tokio::sync::Mutex;

use crate::models::job::{target_key, Job, JobListQuery, NewJob};
use crate::models::prospect::{
    NewProspect, Prospect, ProspectListQuery, ProspectUpdate, StageWrite, UpsertedProspect,
};
use crate::models::scraper_config::ScraperConfig;
use crate::store::{
    page, JobStore, ProspectStore, ScraperConfigStore, Store, StoreError, StoreResult,
};

#[derive(Debug)]
struct State {
    prospects: BTreeMap<DbId, Prospect>,
    jobs: BTreeMap<DbId, Job>,
    config: ScraperConfig,
    next_prospect_id: DbId,
    next_job_id: DbId,
}

#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                prospects: BTreeMap::new(),
                jobs: BTreeMap::new(),
                config: ScraperConfig::initial(Utc::now()),
                next_prospect_id: 1,
                next_job_id: 1,
            }),
        }
    }

    /// Overwrite a prospect directly, bypassing stage checks. Test fixture
    /// helper for placing a prospect mid-pipeline.
    pub async fn put_prospect(&self, prospect: Prospect) {
        let mut state = self.state.lock().await;
        state.next_prospect_id = state.next_prospect_id.max(prospect.id + 1);
        state.prospects.insert(prospect.id, prospect);
    }
}

/// `score DESC NULLS LAST, updated_at DESC, id DESC`.
fn rank(a: &Prospect, b: &Prospect) -> Ordering {
    let by_score = match (a.score, b.score) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_score
        .then_with(|| b.updated_at.cmp(&a.updated_at))
        .then_with(|| b.id.cmp(&a.id))
}

/// Mirrors the `ck_prospects_*` check constraints.
fn check_constraints(p: &Prospect) -> StoreResult<()> {
    if (p.stage == Stage::Failed) != p.failed_from.is_some() {
        return Err(StoreError::Constraint("ck_prospects_failed_from".into()));
    }
    if matches!(p.stage, Stage::Drafted | Stage::Sent)
        && !(p.verification_status == VerificationStatus::Verified && p.contact_email.is_some())
    {
        return Err(StoreError::Constraint(
            "ck_prospects_drafted_requires_verified".into(),
        ));
    }
    if p.score.is_some_and(|s| !(0.0..=100.0).contains(&s)) {
        return Err(StoreError::Constraint("ck_prospects_score_range".into()));
    }
    Ok(())
}

fn apply_update(p: &mut Prospect, u: &ProspectUpdate) {
    fn merge<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
        if let Some(v) = value {
            *slot = Some(v.clone());
        }
    }
    merge(&mut p.title, &u.title);
    merge(&mut p.contact_email, &u.contact_email);
    merge(&mut p.domain_authority, &u.domain_authority);
    merge(&mut p.backlinks, &u.backlinks);
    merge(&mut p.metrics, &u.metrics);
    if let Some(status) = u.verification_status {
        p.verification_status = status;
    }
    if u.replace_verification {
        p.verification_confidence = u.verification_confidence;
        p.verification = u.verification.clone();
    } else {
        merge(&mut p.verification_confidence, &u.verification_confidence);
        merge(&mut p.verification, &u.verification);
    }
    merge(&mut p.score, &u.score);
    merge(&mut p.score_breakdown, &u.score_breakdown);
    merge(&mut p.draft_subject, &u.draft_subject);
    merge(&mut p.draft_body, &u.draft_body);
    merge(&mut p.sent_at, &u.sent_at);
    merge(&mut p.sent_message_id, &u.sent_message_id);
}

/// A timestamp strictly after `previous`, so `updated_at` always advances.
fn advance(previous: Timestamp) -> Timestamp {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + chrono::Duration::microseconds(1)
    }
}

#[async_trait]
impl ProspectStore for MemoryStore {
    async fn upsert_prospect(&self, input: &NewProspect) -> StoreResult<UpsertedProspect> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state
            .prospects
            .values_mut()
            .find(|p| p.domain == input.domain)
        {
            if existing.title.is_none() {
                existing.title = input.title.clone();
            }
            if existing.category.is_none() {
                existing.category = input.category;
            }
            if existing.location.is_none() {
                existing.location = input.location;
            }
            if existing.contact_email.is_none() {
                existing.contact_email = input.contact_email.clone();
            }
            existing.updated_at = advance(existing.updated_at);
            return Ok(UpsertedProspect {
                prospect: existing.clone(),
                created: false,
            });
        }

        let id = state.next_prospect_id;
        state.next_prospect_id += 1;
        let now = Utc::now();
        let prospect = Prospect {
            id,
            url: input.url.clone(),
            domain: input.domain.clone(),
            title: input.title.clone(),
            category: input.category,
            location: input.location,
            stage: Stage::Discovered,
            failed_from: None,
            last_error: None,
            contact_email: input.contact_email.clone(),
            verification_status: VerificationStatus::Unchecked,
            verification_confidence: None,
            verification: None,
            domain_authority: None,
            backlinks: None,
            metrics: None,
            score: None,
            score_breakdown: None,
            draft_subject: None,
            draft_body: None,
            sent_at: None,
            sent_message_id: None,
            created_at: now,
            updated_at: now,
        };
        state.prospects.insert(id, prospect.clone());
        Ok(UpsertedProspect {
            prospect,
            created: true,
        })
    }

    async fn find_prospect(&self, id: DbId) -> StoreResult<Option<Prospect>> {
        Ok(self.state.lock().await.prospects.get(&id).cloned())
    }

    async fn find_prospects(&self, ids: &[DbId]) -> StoreResult<Vec<Prospect>> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.prospects.get(id).cloned())
            .collect())
    }

    async fn eligible_prospects(&self, stage: Stage, limit: i64) -> StoreResult<Vec<Prospect>> {
        let state = self.state.lock().await;
        let mut found: Vec<Prospect> = state
            .prospects
            .values()
            .filter(|p| p.stage == stage)
            .cloned()
            .collect();
        found.sort_by(rank);
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }

    async fn list_prospects(&self, query: &ProspectListQuery) -> StoreResult<Vec<Prospect>> {
        let (limit, offset) = page(query.limit, query.offset);
        let state = self.state.lock().await;
        let mut found: Vec<Prospect> = state
            .prospects
            .values()
            .filter(|p| query.stage.map_or(true, |s| p.stage == s))
            .cloned()
            .collect();
        found.sort_by(rank);
        Ok(found
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn write_stage(&self, write: &StageWrite) -> StoreResult<Option<Prospect>> {
        let mut state = self.state.lock().await;
        let Some(current) = state.prospects.get(&write.prospect_id) else {
            return Ok(None);
        };
        if current.stage != write.expected {
            return Ok(None);
        }

        let mut next = current.clone();
        next.stage = write.next;
        next.failed_from = write.failed_from;
        next.last_error = write.last_error.clone();
        apply_update(&mut next, &write.update);
        next.updated_at = advance(current.updated_at);
        check_constraints(&next)?;

        state.prospects.insert(next.id, next.clone());
        Ok(Some(next))
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_job(&self, input: &NewJob) -> StoreResult<Job> {
        let mut state = self.state.lock().await;
        let id = state.next_job_id;
        state.next_job_id += 1;
        let now = Utc::now();
        let job = Job {
            id,
            job_type: input.job_type,
            status: JobStatus::Pending,
            origin: input.origin,
            target_ids: input.target_ids.clone(),
            parameters: input.parameters.clone(),
            result: None,
            error_message: None,
            retry_of_job_id: input.retry_of_job_id,
            claimed_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        state.jobs.insert(id, job.clone());
        Ok(job)
    }

    async fn claim_next(&self, job_type: JobType) -> StoreResult<Option<Job>> {
        let mut state = self.state.lock().await;

        // Ids are assigned in insertion order, so the first pending entry is
        // the oldest.
        let Some(head) = state
            .jobs
            .values()
            .find(|j| j.job_type == job_type && j.status == JobStatus::Pending)
        else {
            return Ok(None);
        };

        let key = target_key(&head.target_ids);
        let blocked = state.jobs.values().any(|j| {
            j.job_type == job_type
                && j.status == JobStatus::Running
                && target_key(&j.target_ids) == key
        });
        if blocked {
            return Ok(None);
        }

        let id = head.id;
        let now = Utc::now();
        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(None);
        };
        job.status = JobStatus::Running;
        job.claimed_at = Some(now);
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn complete_job(&self, id: DbId, result: &serde_json::Value) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(false);
        };
        if !job.status.can_transition(JobStatus::Completed) {
            return Ok(false);
        }
        let now = Utc::now();
        job.status = JobStatus::Completed;
        job.result = Some(result.clone());
        job.completed_at = Some(now);
        job.updated_at = now;
        Ok(true)
    }

    async fn fail_job(
        &self,
        id: DbId,
        error_message: &str,
        result: Option<&serde_json::Value>,
    ) -> StoreResult<bool> {
        if error_message.trim().is_empty() {
            return Err(StoreError::Constraint("ck_jobs_failed_has_message".into()));
        }
        let mut state = self.state.lock().await;
        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(false);
        };
        if !job.status.can_transition(JobStatus::Failed) {
            return Ok(false);
        }
        let now = Utc::now();
        job.status = JobStatus::Failed;
        job.error_message = Some(error_message.to_string());
        if let Some(result) = result {
            job.result = Some(result.clone());
        }
        job.completed_at = Some(now);
        job.updated_at = now;
        Ok(true)
    }

    async fn fail_running_jobs(&self, error_message: &str) -> StoreResult<Vec<Job>> {
        if error_message.trim().is_empty() {
            return Err(StoreError::Constraint("ck_jobs_failed_has_message".into()));
        }
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let mut failed = Vec::new();
        for job in state.jobs.values_mut().filter(|j| j.status == JobStatus::Running) {
            job.status = JobStatus::Failed;
            job.error_message = Some(error_message.to_string());
            job.completed_at = Some(now);
            job.updated_at = now;
            failed.push(job.clone());
        }
        Ok(failed)
    }

    async fn find_job(&self, id: DbId) -> StoreResult<Option<Job>> {
        Ok(self.state.lock().await.jobs.get(&id).cloned())
    }

    async fn list_jobs(&self, query: &JobListQuery) -> StoreResult<Vec<Job>> {
        let (limit, offset) = page(query.limit, query.offset);
        let state = self.state.lock().await;
        let mut found: Vec<Job> = state
            .jobs
            .values()
            .filter(|j| query.job_type.map_or(true, |t| j.job_type == t))
            .filter(|j| query.status.map_or(true, |s| j.status == s))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(found
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

#[async_trait]
impl ScraperConfigStore for MemoryStore {
    async fn load_config(&self) -> StoreResult<ScraperConfig> {
        Ok(self.state.lock().await.config.clone())
    }

    async fn save_config(
        &self,
        expected_version: i64,
        config: &ScraperConfig,
    ) -> StoreResult<Option<ScraperConfig>> {
        if config.auto_enabled && !config.master_enabled {
            return Err(StoreError::Constraint(
                "ck_scraper_config_auto_requires_master".into(),
            ));
        }
        let mut state = self.state.lock().await;
        if state.config.version != expected_version {
            return Ok(None);
        }
        let mut next = config.clone();
        next.version = expected_version + 1;
        next.updated_at = Utc::now();
        state.config = next.clone();
        Ok(Some(next))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
