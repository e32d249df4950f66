//! Prospect scoring (weighted multi-factor sum).
//!
//! Pure functions only: the engine never performs I/O. External metrics
//! (authority, backlinks, verification confidence) must already be attached
//! to the [`ScoringInput`].
//!
//! ```text
//! score = 0.30*domain_authority + 0.25*has_email + 0.15*email_confidence
//!       + 0.15*topical_relevance + 0.10*data_quality + 0.05*recency
//! ```
//!
//! Every factor is on a 0..=100 scale, so the score is too.

use serde::{Deserialize, Serialize};

use crate::targeting::Category;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

pub const WEIGHT_DOMAIN_AUTHORITY: f64 = 0.30;
pub const WEIGHT_HAS_EMAIL: f64 = 0.25;
pub const WEIGHT_EMAIL_CONFIDENCE: f64 = 0.15;
pub const WEIGHT_TOPICAL_RELEVANCE: f64 = 0.15;
pub const WEIGHT_DATA_QUALITY: f64 = 0.10;
pub const WEIGHT_RECENCY: f64 = 0.05;

/// Authority assumed when neither a metric nor a backlink count exists.
pub const DEFAULT_DOMAIN_AUTHORITY: f64 = 20.0;

/// Confidence assumed for an email that has not been verified yet.
pub const UNVERIFIED_EMAIL_CONFIDENCE: f64 = 50.0;

/// Floor of the relevance band for any keyword match.
pub const RELEVANCE_MATCH_FLOOR: f64 = 50.0;

/// Number of optional fields tracked by the data quality factor
/// (title, URL, metrics payload, verification payload).
const DATA_QUALITY_FIELDS: u32 = 4;

// ---------------------------------------------------------------------------
// Input / output
// ---------------------------------------------------------------------------

/// Snapshot of everything the engine looks at.
#[derive(Debug, Clone, Default)]
pub struct ScoringInput<'a> {
    pub url: Option<&'a str>,
    pub title: Option<&'a str>,
    pub contact_email: Option<&'a str>,
    pub category: Option<Category>,
    /// External authority metric (0..=100), if the SEO lookup returned one.
    pub domain_authority: Option<f64>,
    pub backlinks: Option<i64>,
    /// Verification confidence (0..=100), if verification has run.
    pub verification_confidence: Option<f64>,
    pub has_metrics_payload: bool,
    pub has_verification_payload: bool,
    pub updated_at: Option<Timestamp>,
}

/// Per-factor values (each 0..=100), stored for auditability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub domain_authority: f64,
    pub has_email: f64,
    pub email_confidence: f64,
    pub topical_relevance: f64,
    pub data_quality: f64,
    pub recency: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Weighted total rounded to one decimal place.
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

// ---------------------------------------------------------------------------
// Pluggable recency
// ---------------------------------------------------------------------------

/// Recency factor hook. Implementations must be deterministic for a given
/// input so re-scoring stays idempotent.
pub trait RecencyFactor: Send + Sync {
    fn recency(&self, input: &ScoringInput<'_>) -> f64;
}

/// Baseline recency: every prospect scores 100.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantRecency;

impl RecencyFactor for ConstantRecency {
    fn recency(&self, _input: &ScoringInput<'_>) -> f64 {
        100.0
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Scoring engine with a swappable recency factor.
pub struct ScoringEngine {
    recency: Box<dyn RecencyFactor>,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(Box::new(ConstantRecency))
    }
}

impl std::fmt::Debug for ScoringEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringEngine").finish_non_exhaustive()
    }
}

impl ScoringEngine {
    pub fn new(recency: Box<dyn RecencyFactor>) -> Self {
        Self { recency }
    }

    /// Compute all factors and the weighted, rounded total.
    pub fn score(&self, input: &ScoringInput<'_>) -> ScoreResult {
        let breakdown = ScoreBreakdown {
            domain_authority: domain_authority_factor(input.domain_authority, input.backlinks),
            has_email: has_email_factor(input.contact_email),
            email_confidence: email_confidence_factor(
                input.contact_email,
                input.verification_confidence,
            ),
            topical_relevance: topical_relevance_factor(input.category, input.title, input.url),
            data_quality: data_quality_factor(input),
            recency: clamp_factor(self.recency.recency(input)),
        };

        ScoreResult {
            score: weighted_total(&breakdown),
            breakdown,
        }
    }
}

/// Weighted sum of a breakdown, rounded to one decimal place.
pub fn weighted_total(b: &ScoreBreakdown) -> f64 {
    let raw = WEIGHT_DOMAIN_AUTHORITY * b.domain_authority
        + WEIGHT_HAS_EMAIL * b.has_email
        + WEIGHT_EMAIL_CONFIDENCE * b.email_confidence
        + WEIGHT_TOPICAL_RELEVANCE * b.topical_relevance
        + WEIGHT_DATA_QUALITY * b.data_quality
        + WEIGHT_RECENCY * b.recency;
    round_one_decimal(raw.clamp(0.0, 100.0))
}

// ---------------------------------------------------------------------------
// Factors
// ---------------------------------------------------------------------------

/// External metric if present, else an estimate from backlinks
/// (`20 * log10(backlinks + 1)`, capped at 100), else 20.
pub fn domain_authority_factor(metric: Option<f64>, backlinks: Option<i64>) -> f64 {
    if let Some(da) = metric.filter(|v| v.is_finite()) {
        return clamp_factor(da);
    }
    match backlinks {
        Some(count) => {
            let count = count.max(0) as f64;
            clamp_factor(20.0 * (count + 1.0).log10())
        }
        None => DEFAULT_DOMAIN_AUTHORITY,
    }
}

pub fn has_email_factor(contact_email: Option<&str>) -> f64 {
    if has_email(contact_email) {
        100.0
    } else {
        0.0
    }
}

pub fn email_confidence_factor(contact_email: Option<&str>, confidence: Option<f64>) -> f64 {
    if !has_email(contact_email) {
        return 0.0;
    }
    match confidence.filter(|v| v.is_finite()) {
        Some(c) => clamp_factor(c),
        None => UNVERIFIED_EMAIL_CONFIDENCE,
    }
}

/// Share of the category's keywords found in the title or URL, mapped onto
/// `[50, 100]` when at least one keyword matches and 0 otherwise.
///
/// Title and URL are split on non-alphanumerics and a keyword matches a
/// whole token or its plural, so "ai" does not match "mountain".
pub fn topical_relevance_factor(
    category: Option<Category>,
    title: Option<&str>,
    url: Option<&str>,
) -> f64 {
    let Some(category) = category else {
        return 0.0;
    };
    let keywords = category.keywords();
    if keywords.is_empty() {
        return 0.0;
    }

    let tokens: Vec<String> = [title, url]
        .into_iter()
        .flatten()
        .flat_map(|text| text.split(|c: char| !c.is_alphanumeric()))
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect();
    let matched = keywords
        .iter()
        .filter(|k| {
            tokens
                .iter()
                .any(|t| t == *k || t.strip_suffix('s') == Some(**k))
        })
        .count();
    if matched == 0 {
        return 0.0;
    }

    let ratio = matched as f64 / keywords.len() as f64;
    RELEVANCE_MATCH_FLOOR + (100.0 - RELEVANCE_MATCH_FLOOR) * ratio
}

/// 25 points per populated tracked field.
pub fn data_quality_factor(input: &ScoringInput<'_>) -> f64 {
    let populated = [
        input.title.is_some_and(|t| !t.trim().is_empty()),
        input.url.is_some_and(|u| !u.trim().is_empty()),
        input.has_metrics_payload,
        input.has_verification_payload,
    ]
    .iter()
    .filter(|present| **present)
    .count() as u32;

    100.0 * populated as f64 / DATA_QUALITY_FIELDS as f64
}

fn has_email(contact_email: Option<&str>) -> bool {
    contact_email.is_some_and(|e| !e.trim().is_empty())
}

fn clamp_factor(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
