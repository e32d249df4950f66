//! Repository for the singleton `scraper_config` row.

use sqlx::PgPool;

use crate::models::scraper_config::{ScraperConfig, ScraperConfigRow};
use crate::store::StoreResult;

/// Column list for `scraper_config` queries.
const COLUMNS: &str = "\
    master_enabled, auto_enabled, locations, categories, run_interval, \
    next_run_at, last_run_at, last_job_id, version, updated_at";

/// Primary key of the only row.
const SINGLETON_ID: i16 = 1;

pub struct ScraperConfigRepo;

impl ScraperConfigRepo {
    /// Read the configuration, seeding the row if a migration did not.
    pub async fn load(pool: &PgPool) -> StoreResult<ScraperConfig> {
        sqlx::query("INSERT INTO scraper_config (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(SINGLETON_ID)
            .execute(pool)
            .await?;

        let query = format!("SELECT {COLUMNS} FROM scraper_config WHERE id = $1");
        let row = sqlx::query_as::<_, ScraperConfigRow>(&query)
            .bind(SINGLETON_ID)
            .fetch_one(pool)
            .await?;
        Ok(row.try_into()?)
    }

    /// Compare-and-swap on `version`.
    pub async fn save(
        pool: &PgPool,
        expected_version: i64,
        config: &ScraperConfig,
    ) -> StoreResult<Option<ScraperConfig>> {
        let locations: Vec<String> = config.locations.iter().map(|l| l.to_string()).collect();
        let categories: Vec<String> = config.categories.iter().map(|c| c.to_string()).collect();

        let query = format!(
            "UPDATE scraper_config SET \
                 master_enabled = $3, auto_enabled = $4, \
                 locations = $5, categories = $6, run_interval = $7, \
                 next_run_at = $8, last_run_at = $9, last_job_id = $10, \
                 version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $2 \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, ScraperConfigRow>(&query)
            .bind(SINGLETON_ID)
            .bind(expected_version)
            .bind(config.master_enabled)
            .bind(config.auto_enabled)
            .bind(&locations)
            .bind(&categories)
            .bind(config.interval.map(|i| i.as_str()))
            .bind(config.next_run_at)
            .bind(config.last_run_at)
            .bind(config.last_job_id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(ScraperConfig::try_from).transpose()?)
    }
}
