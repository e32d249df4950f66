//! Background job vocabulary: types, statuses, parameters, and the result
//! summary a handler reports.

use serde::{Deserialize, Serialize};

use crate::stage::Transition;
use crate::targeting::{Category, Location};
use crate::types::DbId;

define_string_enum! {
    /// The unit of work a job performs. Each type has its own queue.
    JobType {
        Discover = "discover",
        Enrich = "enrich",
        Score = "score",
        Verify = "verify",
        Draft = "draft",
        Send = "send",
    }
}

define_string_enum! {
    /// Job lifecycle status. `completed` and `failed` are terminal.
    JobStatus {
        Pending = "pending",
        Running = "running",
        Completed = "completed",
        Failed = "failed",
    }
}

define_string_enum! {
    /// Who asked for a job.
    JobOrigin {
        Manual = "manual",
        Automation = "automation",
        Retry = "retry",
    }
}

impl JobType {
    /// The stage transition a job of this type applies.
    ///
    /// Discovery creates prospects and then applies [`Transition::Scrape`]
    /// to the ones it created.
    pub fn transition(self) -> Transition {
        match self {
            JobType::Discover => Transition::Scrape,
            JobType::Enrich => Transition::Enrich,
            JobType::Score => Transition::Score,
            JobType::Verify => Transition::Verify,
            JobType::Draft => Transition::Draft,
            JobType::Send => Transition::Send,
        }
    }
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Statuses reachable from `self`. Transitions are monotonic.
    pub fn valid_transitions(self) -> &'static [JobStatus] {
        match self {
            JobStatus::Pending => &[JobStatus::Running, JobStatus::Failed],
            JobStatus::Running => &[JobStatus::Completed, JobStatus::Failed],
            JobStatus::Completed | JobStatus::Failed => &[],
        }
    }

    pub fn can_transition(self, to: JobStatus) -> bool {
        self.valid_transitions().contains(&to)
    }
}

/// Free-form options carried on a job row as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobParameters {
    /// Re-run the transition on explicitly targeted prospects that are
    /// already past it.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reprocess: bool,
    /// Discovery scope. Empty means "use the automation configuration".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<Category>,
}

impl JobParameters {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }

    /// Lenient decode: unknown or malformed parameters fall back to defaults.
    pub fn from_json(value: &serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

/// Per-prospect outcome recorded in a job summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Succeeded,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProspectOutcome {
    pub prospect_id: Option<DbId>,
    pub outcome: OutcomeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Summary of a handler run, stored as the job's `result`.
///
/// Partial success is normal: a completed job may list skipped and failed
/// prospects alongside the ones it advanced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub succeeded: u32,
    pub skipped: u32,
    pub failed: u32,
    /// Prospects created by discovery (merged duplicates are not counted).
    #[serde(default)]
    pub created: u32,
    #[serde(default)]
    pub outcomes: Vec<ProspectOutcome>,
}

impl JobSummary {
    pub fn succeeded(&mut self, prospect_id: DbId) {
        self.succeeded += 1;
        self.push(Some(prospect_id), OutcomeKind::Succeeded, None);
    }

    pub fn skipped(&mut self, prospect_id: DbId, detail: impl Into<String>) {
        self.skipped += 1;
        self.push(Some(prospect_id), OutcomeKind::Skipped, Some(detail.into()));
    }

    /// Record a failure; `prospect_id` is `None` for batch-level failures
    /// such as a discovery query that returned an error.
    pub fn failed(&mut self, prospect_id: Option<DbId>, detail: impl Into<String>) {
        self.failed += 1;
        self.push(prospect_id, OutcomeKind::Failed, Some(detail.into()));
    }

    pub fn total(&self) -> u32 {
        self.succeeded + self.skipped + self.failed
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }

    fn push(&mut self, prospect_id: Option<DbId>, outcome: OutcomeKind, detail: Option<String>) {
        self.outcomes.push(ProspectOutcome {
            prospect_id,
            outcome,
            detail,
        });
    }
}
