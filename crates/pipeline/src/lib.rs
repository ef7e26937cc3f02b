//! Record processing and batch orchestration.
//!
//! Ties the stages together:
//! - `process_record`: cache, curated match, local rules, completion fallback,
//!   deterministic fallback, scoring, cache write
//! - `process_batch`: bounded concurrency, order-preserving, optional deadline
//! - `handle_enrich` / `handle_batch`: transport-agnostic endpoint handlers
//!
//! Only input-shape errors surface to callers. Everything else degrades to a
//! best-effort name plus flags.

mod api;
mod batch;
mod cache;
mod limiter;
mod strategy;

pub use api::{handle_batch, handle_enrich, ApiResponse};
pub use batch::process_batch;
pub use cache::{CacheError, MemoryCache, NameCache, NoCache};
pub use limiter::RateLimiter;
pub use strategy::{process_record, AdapterError};

use dealername_completion::CompletionOptions;
use dealername_lexicon::Lexicon;
use dealername_prompt::DEFAULT_MAX_EXAMPLES;
use dealername_score::ScoreConfig;
use std::sync::Arc;
use std::time::Duration;

/// Pipeline tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Records processed at once within a batch
    pub concurrency: usize,
    /// Results below this confidence are flagged for review
    pub review_threshold: u8,
    /// Minimum confidence for a result to be cached
    pub cache_write_threshold: u8,
    pub cache_ttl: Duration,
    /// Minimum spacing between completion calls, process-wide
    pub min_completion_interval: Duration,
    /// Wall-clock ceiling for a whole batch
    pub batch_deadline: Option<Duration>,
    /// Ask the completion service when local rules are inconclusive
    pub use_completion: bool,
    pub max_examples: usize,
    pub completion: CompletionOptions,
    pub score: ScoreConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            review_threshold: 60,
            cache_write_threshold: 75,
            cache_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            min_completion_interval: Duration::from_secs(3),
            batch_deadline: None,
            use_completion: true,
            max_examples: DEFAULT_MAX_EXAMPLES,
            completion: CompletionOptions::default(),
            score: ScoreConfig::default(),
        }
    }
}

/// Everything a record needs while it is processed.
///
/// Shared by reference across the concurrent records of a batch; the lexicon
/// is read-only and the cache and limiter synchronize internally.
pub struct ProcessingContext<S, C> {
    pub lexicon: Arc<Lexicon>,
    pub completion: S,
    pub cache: C,
    pub limiter: RateLimiter,
    pub config: PipelineConfig,
}

impl<S, C> ProcessingContext<S, C> {
    pub fn new(lexicon: Arc<Lexicon>, completion: S, cache: C, config: PipelineConfig) -> Self {
        Self {
            lexicon,
            completion,
            cache,
            limiter: RateLimiter::new(config.min_completion_interval),
            config,
        }
    }
}
