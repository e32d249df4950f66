//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod job_repo;
pub mod prospect_repo;
pub mod scraper_config_repo;

pub use job_repo::JobRepo;
pub use prospect_repo::ProspectRepo;
pub use scraper_config_repo::ScraperConfigRepo;

/// SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE for `check_violation`.
const CHECK_VIOLATION: &str = "23514";

/// Name of the violated constraint if `err` is a unique violation.
fn unique_violation(err: &sqlx::Error) -> Option<String> {
    violation(err, UNIQUE_VIOLATION)
}

/// Name of the violated constraint if `err` is a check violation.
fn check_violation(err: &sqlx::Error) -> Option<String> {
    violation(err, CHECK_VIOLATION)
}

fn violation(err: &sqlx::Error, code: &str) -> Option<String> {
    let db_err = err.as_database_error()?;
    if db_err.code().as_deref() == Some(code) {
        Some(db_err.constraint().unwrap_or("unknown").to_string())
    } else {
        None
    }
}
