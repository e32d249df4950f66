use std::sync::Arc;

use prospector_adapters::Adapters;
use prospector_core::scoring::ScoringEngine;
use prospector_db::Store;

/// Default cap on prospects selected per job when no targets are given.
pub const DEFAULT_BATCH_LIMIT: i64 = 50;

/// Default minimum score for drafting.
pub const DEFAULT_DRAFT_MIN_SCORE: f64 = 40.0;

/// Default number of results requested per discovery search.
pub const DEFAULT_DISCOVERY_LIMIT: u32 = 25;

/// Tunables for the stage handlers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub batch_limit: i64,
    pub draft_min_score: f64,
    pub discovery_limit: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_limit: DEFAULT_BATCH_LIMIT,
            draft_min_score: DEFAULT_DRAFT_MIN_SCORE,
            discovery_limit: DEFAULT_DISCOVERY_LIMIT,
        }
    }
}

/// Everything a handler needs. Cheaply cloneable.
#[derive(Clone)]
pub struct PipelineContext {
    pub store: Arc<dyn Store>,
    pub adapters: Adapters,
    pub scoring: Arc<ScoringEngine>,
    pub settings: PipelineSettings,
}

impl PipelineContext {
    pub fn new(store: Arc<dyn Store>, adapters: Adapters, settings: PipelineSettings) -> Self {
        Self {
            store,
            adapters,
            scoring: Arc::new(ScoringEngine::default()),
            settings,
        }
    }

    pub fn with_scoring(mut self, scoring: ScoringEngine) -> Self {
        self.scoring = Arc::new(scoring);
        self
    }
}
