//! The singleton automation configuration record.

use prospector_core::automation::AutomationFields;
use prospector_core::error::CoreError;
use prospector_core::targeting::{parse_set, Category, Interval, Location};
use prospector_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Versioned automation configuration. Every write bumps `version`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScraperConfig {
    pub master_enabled: bool,
    /// Stored flag. Read through [`ScraperConfig::fields`] to get the
    /// effective value.
    pub auto_enabled: bool,
    pub locations: Vec<Location>,
    pub categories: Vec<Category>,
    pub interval: Option<Interval>,
    pub next_run_at: Option<Timestamp>,
    pub last_run_at: Option<Timestamp>,
    pub last_job_id: Option<DbId>,
    pub version: i64,
    pub updated_at: Timestamp,
}

impl ScraperConfig {
    /// The initial record: everything off and empty.
    pub fn initial(now: Timestamp) -> Self {
        Self {
            master_enabled: false,
            auto_enabled: false,
            locations: Vec::new(),
            categories: Vec::new(),
            interval: None,
            next_run_at: None,
            last_run_at: None,
            last_job_id: None,
            version: 1,
            updated_at: now,
        }
    }

    pub fn fields(&self) -> AutomationFields<'_> {
        AutomationFields {
            master_enabled: self.master_enabled,
            locations: &self.locations,
            categories: &self.categories,
            interval: self.interval,
        }
    }

    /// `auto_enabled` re-evaluated against the current fields.
    pub fn effective_auto(&self) -> bool {
        self.fields().effective_auto(self.auto_enabled)
    }
}

/// A row from the `scraper_config` table.
#[derive(Debug, Clone, FromRow)]
pub struct ScraperConfigRow {
    pub master_enabled: bool,
    pub auto_enabled: bool,
    pub locations: Vec<String>,
    pub categories: Vec<String>,
    pub run_interval: Option<String>,
    pub next_run_at: Option<Timestamp>,
    pub last_run_at: Option<Timestamp>,
    pub last_job_id: Option<DbId>,
    pub version: i64,
    pub updated_at: Timestamp,
}

impl TryFrom<ScraperConfigRow> for ScraperConfig {
    type Error = CoreError;

    fn try_from(row: ScraperConfigRow) -> Result<Self, Self::Error> {
        Ok(Self {
            master_enabled: row.master_enabled,
            auto_enabled: row.auto_enabled,
            locations: parse_set(&row.locations)?,
            categories: parse_set(&row.categories)?,
            interval: row.run_interval.map(Interval::try_from).transpose()?,
            next_run_at: row.next_run_at,
            last_run_at: row.last_run_at,
            last_job_id: row.last_job_id,
            version: row.version,
            updated_at: row.updated_at,
        })
    }
}
