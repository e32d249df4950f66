//! Prospect entity models and DTOs.

use prospector_core::error::CoreError;
use prospector_core::scoring::{ScoreBreakdown, ScoringInput};
use prospector_core::stage::{Stage, VerificationStatus};
use prospector_core::targeting::{Category, Location};
use prospector_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// A prospect: one candidate website moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prospect {
    pub id: DbId,
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub category: Option<Category>,
    pub location: Option<Location>,
    pub stage: Stage,
    /// Stage held before entering `FAILED`; `None` unless failed.
    pub failed_from: Option<Stage>,
    pub last_error: Option<String>,
    pub contact_email: Option<String>,
    pub verification_status: VerificationStatus,
    pub verification_confidence: Option<f64>,
    pub verification: Option<serde_json::Value>,
    pub domain_authority: Option<f64>,
    pub backlinks: Option<i64>,
    pub metrics: Option<serde_json::Value>,
    pub score: Option<f64>,
    pub score_breakdown: Option<ScoreBreakdown>,
    pub draft_subject: Option<String>,
    pub draft_body: Option<String>,
    pub sent_at: Option<Timestamp>,
    pub sent_message_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Prospect {
    /// The stage a transition check should treat this prospect as being in.
    pub fn effective_stage(&self) -> Stage {
        self.failed_from.unwrap_or(self.stage)
    }

    /// Snapshot of the fields the scoring engine reads.
    pub fn scoring_input(&self) -> ScoringInput<'_> {
        ScoringInput {
            url: Some(self.url.as_str()),
            title: self.title.as_deref(),
            contact_email: self.contact_email.as_deref(),
            category: self.category,
            domain_authority: self.domain_authority,
            backlinks: self.backlinks,
            verification_confidence: self.verification_confidence,
            has_metrics_payload: self.metrics.is_some(),
            has_verification_payload: self.verification.is_some(),
            updated_at: Some(self.updated_at),
        }
    }
}

/// A row from the `prospects` table, with enum columns still as text.
#[derive(Debug, Clone, FromRow)]
pub struct ProspectRow {
    pub id: DbId,
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub stage: String,
    pub failed_from: Option<String>,
    pub last_error: Option<String>,
    pub contact_email: Option<String>,
    pub verification_status: String,
    pub verification_confidence: Option<f64>,
    pub verification: Option<serde_json::Value>,
    pub domain_authority: Option<f64>,
    pub backlinks: Option<i64>,
    pub metrics: Option<serde_json::Value>,
    pub score: Option<f64>,
    pub score_breakdown: Option<Json<ScoreBreakdown>>,
    pub draft_subject: Option<String>,
    pub draft_body: Option<String>,
    pub sent_at: Option<Timestamp>,
    pub sent_message_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<ProspectRow> for Prospect {
    type Error = CoreError;

    fn try_from(row: ProspectRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            url: row.url,
            domain: row.domain,
            title: row.title,
            category: row.category.map(Category::try_from).transpose()?,
            location: row.location.map(Location::try_from).transpose()?,
            stage: row.stage.parse()?,
            failed_from: row.failed_from.map(Stage::try_from).transpose()?,
            last_error: row.last_error,
            contact_email: row.contact_email,
            verification_status: row.verification_status.parse()?,
            verification_confidence: row.verification_confidence,
            verification: row.verification,
            domain_authority: row.domain_authority,
            backlinks: row.backlinks,
            metrics: row.metrics,
            score: row.score,
            score_breakdown: row.score_breakdown.map(|j| j.0),
            draft_subject: row.draft_subject,
            draft_body: row.draft_body,
            sent_at: row.sent_at,
            sent_message_id: row.sent_message_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// DTO for a discovered website. Upserted by `domain`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewProspect {
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub category: Option<Category>,
    pub location: Option<Location>,
    pub contact_email: Option<String>,
}

/// Result of an upsert: the stored prospect and whether it was new.
#[derive(Debug, Clone)]
pub struct UpsertedProspect {
    pub prospect: Prospect,
    pub created: bool,
}

/// Data written alongside a stage change. `None` leaves a column unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProspectUpdate {
    pub title: Option<String>,
    pub contact_email: Option<String>,
    pub domain_authority: Option<f64>,
    pub backlinks: Option<i64>,
    pub metrics: Option<serde_json::Value>,
    pub verification_status: Option<VerificationStatus>,
    pub verification_confidence: Option<f64>,
    pub verification: Option<serde_json::Value>,
    pub score: Option<f64>,
    pub score_breakdown: Option<ScoreBreakdown>,
    pub draft_subject: Option<String>,
    pub draft_body: Option<String>,
    pub sent_at: Option<Timestamp>,
    pub sent_message_id: Option<String>,
    /// Write `verification_confidence` and `verification` as given, `None`
    /// included. A fresh check replaces every field of the previous one.
    pub replace_verification: bool,
}

/// A compare-and-swap stage write.
///
/// Applied only if the stored stage still equals `expected`. `failed_from`
/// and `last_error` are always overwritten (cleared when leaving `FAILED`).
#[derive(Debug, Clone, PartialEq)]
pub struct StageWrite {
    pub prospect_id: DbId,
    pub expected: Stage,
    pub next: Stage,
    pub failed_from: Option<Stage>,
    pub last_error: Option<String>,
    pub update: ProspectUpdate,
}

/// Query parameters for `GET /api/v1/prospects`.
#[derive(Debug, Default, Deserialize)]
pub struct ProspectListQuery {
    pub stage: Option<Stage>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}
