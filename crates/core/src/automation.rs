//! Automation scheduling rules.
//!
//! Pure predicates over the scraper configuration. The controller in the
//! worker crate calls these on every read instead of caching their result.

use serde::Serialize;

use crate::targeting::{Category, Interval, Location};
use crate::types::Timestamp;

pub const FIELD_MASTER_ENABLED: &str = "master_enabled";
pub const FIELD_LOCATIONS: &str = "locations";
pub const FIELD_CATEGORIES: &str = "categories";
pub const FIELD_INTERVAL: &str = "interval";

/// The fields the automation switch depends on.
#[derive(Debug, Clone, Copy)]
pub struct AutomationFields<'a> {
    pub master_enabled: bool,
    pub locations: &'a [Location],
    pub categories: &'a [Category],
    pub interval: Option<Interval>,
}

impl AutomationFields<'_> {
    /// Configuration fields that are still empty, in a stable order.
    ///
    /// The master switch is not a configuration field and is never listed.
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.locations.is_empty() {
            missing.push(FIELD_LOCATIONS.to_string());
        }
        if self.categories.is_empty() {
            missing.push(FIELD_CATEGORIES.to_string());
        }
        if self.interval.is_none() {
            missing.push(FIELD_INTERVAL.to_string());
        }
        missing
    }

    /// Whether the automatic switch may be turned on.
    pub fn can_enable_auto(&self) -> bool {
        self.master_enabled && self.missing_fields().is_empty()
    }

    /// Effective automatic state: the stored flag only counts while the
    /// preconditions still hold.
    pub fn effective_auto(&self, stored_auto: bool) -> bool {
        stored_auto && self.can_enable_auto()
    }
}

/// Derived automation status shown to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationStatus {
    Running,
    Idle,
    Disabled,
}

/// `running` wins over everything (a job may still be finishing after the
/// master switch was turned off), then `disabled`, then `idle`.
pub fn derive_status(master_enabled: bool, discover_job_running: bool) -> AutomationStatus {
    if discover_job_running {
        AutomationStatus::Running
    } else if !master_enabled {
        AutomationStatus::Disabled
    } else {
        AutomationStatus::Idle
    }
}

/// Next run time after `from` for the given interval.
pub fn next_run_after(from: Timestamp, interval: Interval) -> Timestamp {
    let period = chrono::Duration::from_std(interval.period())
        .unwrap_or_else(|_| chrono::Duration::hours(1));
    from + period
}

/// Whether a scheduled run is due.
pub fn is_due(next_run_at: Option<Timestamp>, now: Timestamp) -> bool {
    next_run_at.is_some_and(|at| at <= now)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn fields<'a>(
        master: bool,
        locations: &'a [Location],
        categories: &'a [Category],
        interval: Option<Interval>,
    ) -> AutomationFields<'a> {
        AutomationFields {
            master_enabled: master,
            locations,
            categories,
            interval,
        }
    }

    #[test]
    fn all_fields_missing_are_listed_in_order() {
        let f = fields(true, &[], &[], None);
        assert_eq!(f.missing_fields(), vec!["locations", "categories", "interval"]);
        assert!(!f.can_enable_auto());
    }

    #[test]
    fn complete_config_with_master_can_enable() {
        let f = fields(
            true,
            &[Location::UnitedStates],
            &[Category::Saas],
            Some(Interval::Daily),
        );
        assert!(f.missing_fields().is_empty());
        assert!(f.can_enable_auto());
    }

    #[test]
    fn master_off_blocks_enable_without_listing_a_field() {
        let f = fields(
            false,
            &[Location::UnitedStates],
            &[Category::Saas],
            Some(Interval::Daily),
        );
        assert!(f.missing_fields().is_empty());
        assert!(!f.can_enable_auto());
    }

    #[test]
    fn effective_auto_is_reevaluated() {
        let f = fields(true, &[Location::Canada], &[], Some(Interval::OneHour));
        assert!(!f.effective_auto(true));
    }

    #[test]
    fn status_projection() {
        assert_eq!(derive_status(false, false), AutomationStatus::Disabled);
        assert_eq!(derive_status(true, false), AutomationStatus::Idle);
        assert_eq!(derive_status(true, true), AutomationStatus::Running);
        assert_eq!(derive_status(false, true), AutomationStatus::Running);
    }

    #[test]
    fn next_run_adds_the_interval() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let next = next_run_after(from, Interval::TwoHours);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 2, 0, 0).unwrap());
    }

    #[test]
    fn due_only_when_time_has_come() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        assert!(!is_due(None, now));
        assert!(is_due(Some(now), now));
        assert!(!is_due(Some(now + chrono::Duration::seconds(1)), now));
    }
}
