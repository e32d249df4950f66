use std::time::Duration;

use prospector_adapters::AdapterConfig;
use prospector_pipeline::context::{
    PipelineSettings, DEFAULT_BATCH_LIMIT, DEFAULT_DISCOVERY_LIMIT, DEFAULT_DRAFT_MIN_SCORE,
};

/// Worker pool, scheduler, and adapter configuration loaded from the
/// environment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Postgres URL. `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// Worker loops started for each job type (default: `1`).
    pub workers_per_type: usize,
    /// How long a worker waits for a job before re-polling (default: `5`s).
    pub claim_timeout: Duration,
    /// Timeout wrapped around every adapter call (default: `30`s).
    pub adapter_timeout: Duration,
    /// Automation scheduler tick (default: `30`s).
    pub scheduler_tick: Duration,
    pub pipeline: PipelineSettings,
    pub adapters: AdapterConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: &str) -> T {
    std::env::var(key)
        .unwrap_or_else(|_| default.into())
        .parse()
        .unwrap_or_else(|_| panic!("{key} must be a valid {}", std::any::type_name::<T>()))
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default |
    /// |------------------------|---------|
    /// | `DATABASE_URL`         | unset (in-memory store) |
    /// | `WORKERS_PER_TYPE`     | `1`     |
    /// | `CLAIM_TIMEOUT_SECS`   | `5`     |
    /// | `ADAPTER_TIMEOUT_SECS` | `30`    |
    /// | `SCHEDULER_TICK_SECS`  | `30`    |
    /// | `BATCH_LIMIT`          | `50`    |
    /// | `DRAFT_MIN_SCORE`      | `40`    |
    /// | `DISCOVERY_LIMIT`      | `25`    |
    ///
    /// Adapter base URLs (`DISCOVERY_URL`, `SEO_URL`, `VERIFIER_URL`,
    /// `DRAFTER_URL`, `SENDER_URL`) and `ADAPTER_API_KEY` are optional.
    pub fn from_env() -> Self {
        let workers_per_type: usize = env_or("WORKERS_PER_TYPE", "1");
        let adapter_timeout = Duration::from_secs(env_or("ADAPTER_TIMEOUT_SECS", "30"));

        let pipeline = PipelineSettings {
            batch_limit: env_or("BATCH_LIMIT", &DEFAULT_BATCH_LIMIT.to_string()),
            draft_min_score: env_or("DRAFT_MIN_SCORE", &DEFAULT_DRAFT_MIN_SCORE.to_string()),
            discovery_limit: env_or("DISCOVERY_LIMIT", &DEFAULT_DISCOVERY_LIMIT.to_string()),
        };

        let adapters = AdapterConfig {
            discovery_url: env_opt("DISCOVERY_URL"),
            seo_url: env_opt("SEO_URL"),
            verifier_url: env_opt("VERIFIER_URL"),
            drafter_url: env_opt("DRAFTER_URL"),
            sender_url: env_opt("SENDER_URL"),
            api_key: env_opt("ADAPTER_API_KEY"),
            timeout: Some(adapter_timeout),
        };

        Self {
            database_url: env_opt("DATABASE_URL"),
            workers_per_type: workers_per_type.max(1),
            claim_timeout: Duration::from_secs(env_or("CLAIM_TIMEOUT_SECS", "5")),
            adapter_timeout,
            scheduler_tick: Duration::from_secs(env_or::<u64>("SCHEDULER_TICK_SECS", "30").max(1)),
            pipeline,
            adapters,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            workers_per_type: 1,
            claim_timeout: Duration::from_secs(5),
            adapter_timeout: Duration::from_secs(30),
            scheduler_tick: Duration::from_secs(30),
            pipeline: PipelineSettings::default(),
            adapters: AdapterConfig::default(),
        }
    }
}
