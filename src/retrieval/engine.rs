//! Retrieval orchestrator
//!
//! Coordinates a query through its phases: validation, cache lookup,
//! concurrent strategy dispatch, fusion, reranking, response assembly.
//! Strategies run as independent spawned tasks bounded by a query-level
//! timeout; a failed or timed-out strategy contributes zero candidates and
//! degrades the response instead of aborting it.

use crate::config::{CacheConfig, Config, FusionConfig, RetrievalConfig};
use crate::error::{QuarryError, Result};
use crate::retrieval::{
    fuse, query_cache_key, CandidateResult, ConceptStrategy, KeywordStrategy, MemoryCache,
    RankedResult, Reranker, ResultCache, SearchMode, SearchQuery, SearchResponse, Strategy,
    StrategyError, VectorStrategy,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

type StrategyHandle = JoinHandle<std::result::Result<Vec<CandidateResult>, StrategyError>>;

/// Aborts the wrapped task when dropped, so a cancelled query does not
/// leak in-flight strategy work
struct StrategyTask(StrategyHandle);

impl Drop for StrategyTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// The public retrieval surface
pub struct RetrievalEngine {
    vector: Arc<VectorStrategy>,
    keyword: Arc<KeywordStrategy>,
    concept: Arc<ConceptStrategy>,
    reranker: Reranker,
    fusion_config: FusionConfig,
    retrieval_config: RetrievalConfig,
    cache_config: CacheConfig,
    cache: Arc<dyn ResultCache>,
    preferences: HashMap<String, f32>,
}

impl RetrievalEngine {
    pub fn new(
        vector: VectorStrategy,
        keyword: KeywordStrategy,
        concept: ConceptStrategy,
        config: &Config,
    ) -> Self {
        Self {
            vector: Arc::new(vector),
            keyword: Arc::new(keyword),
            concept: Arc::new(concept),
            reranker: Reranker::new(config.rerank.clone()),
            fusion_config: config.fusion.clone(),
            retrieval_config: config.retrieval.clone(),
            cache_config: config.cache.clone(),
            cache: Arc::new(MemoryCache::new(config.cache.max_entries)),
            preferences: HashMap::new(),
        }
    }

    /// Substitute a different result cache implementation
    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Provide per-resource preference scores in [0, 1]
    pub fn with_preferences(mut self, preferences: HashMap<String, f32>) -> Self {
        self.preferences = preferences;
        self
    }

    /// Run a query through the full pipeline.
    ///
    /// Returns `Err` only for invalid queries; strategy failures degrade
    /// the response (empty and flagged when every strategy failed) but
    /// never surface as errors.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResponse> {
        query.validate().map_err(QuarryError::InvalidQuery)?;

        let started = Instant::now();
        tracing::debug!(
            phase = "received",
            mode = query.mode.as_str(),
            top_k = query.top_k,
            "query accepted"
        );

        let cache_key = query_cache_key(query);
        if self.cache_config.enabled {
            if let Some(hit) = self.cache.get(&cache_key) {
                tracing::debug!(phase = "done", "served from cache");
                return Ok(hit);
            }
        }

        let limit = self.retrieval_config.candidate_multiplier * query.top_k;
        let deadline = tokio::time::Instant::now()
            + Duration::from_millis(self.retrieval_config.strategy_timeout_ms);

        // Dispatch the mode's strategies as parallel tasks; none of them
        // cancels another
        tracing::debug!(phase = "dispatched");

        let vector_task = self.runs(query.mode, Strategy::Vector).then(|| {
            let strategy = Arc::clone(&self.vector);
            let query = query.clone();
            StrategyTask(tokio::spawn(async move { strategy.search(&query, limit).await }))
        });

        let keyword_task = self.runs(query.mode, Strategy::Keyword).then(|| {
            let strategy = Arc::clone(&self.keyword);
            let query = query.clone();
            StrategyTask(tokio::spawn(async move { strategy.search(&query, limit).await }))
        });

        let concept_task = self.runs(query.mode, Strategy::Concept).then(|| {
            let strategy = Arc::clone(&self.concept);
            let query = query.clone();
            StrategyTask(tokio::spawn(async move { strategy.search(&query, limit).await }))
        });

        let mut dispatched = 0usize;
        let mut failed = 0usize;

        let vector_candidates =
            collect(Strategy::Vector, vector_task, deadline, &mut dispatched, &mut failed).await;
        let keyword_candidates =
            collect(Strategy::Keyword, keyword_task, deadline, &mut dispatched, &mut failed).await;
        let concept_candidates =
            collect(Strategy::Concept, concept_task, deadline, &mut dispatched, &mut failed).await;

        let degraded = failed > 0;

        if failed == dispatched {
            // Total strategy failure: an empty, clearly flagged response,
            // never an error to the caller
            tracing::warn!(phase = "done", "all retrieval strategies failed");
            return Ok(SearchResponse {
                results: Vec::new(),
                total_found: 0,
                search_time_ms: started.elapsed().as_secs_f64() * 1000.0,
                degraded: true,
                failure_reason: Some("all retrieval strategies failed".to_string()),
            });
        }

        tracing::debug!(phase = "fusing");
        let fused = fuse(
            vector_candidates,
            keyword_candidates,
            concept_candidates,
            &self.fusion_config,
        );
        let total_found = fused.len();

        let mut ranked: Vec<RankedResult> = if query.enable_rerank && fused.len() > 1 {
            tracing::debug!(phase = "reranking");
            self.reranker
                .rerank(fused, &self.preferences, chrono::Utc::now().timestamp())
        } else {
            self.reranker.passthrough(fused)
        };
        ranked.truncate(query.top_k);

        let response = SearchResponse {
            results: ranked,
            total_found,
            search_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            degraded,
            failure_reason: None,
        };

        // Cache full-coverage responses only; degraded coverage and
        // failures must not stick
        if self.cache_config.enabled && !degraded {
            self.cache.set(
                cache_key,
                response.clone(),
                Duration::from_secs(self.cache_config.ttl_secs),
            );
        }

        tracing::debug!(
            phase = "done",
            results = response.results.len(),
            degraded = response.degraded
        );
        Ok(response)
    }

    fn runs(&self, mode: SearchMode, strategy: Strategy) -> bool {
        matches!(
            (mode, strategy),
            (SearchMode::Hybrid, _)
                | (SearchMode::Vector, Strategy::Vector)
                | (SearchMode::Keyword, Strategy::Keyword)
                | (SearchMode::Concept, Strategy::Concept)
        )
    }
}

/// Await one strategy task against the shared deadline.
///
/// Failures and timeouts are converted to zero candidates here, at the
/// orchestrator boundary; a timed-out task is aborted by the guard's drop
/// so no work leaks.
async fn collect(
    strategy: Strategy,
    task: Option<StrategyTask>,
    deadline: tokio::time::Instant,
    dispatched: &mut usize,
    failed: &mut usize,
) -> Vec<CandidateResult> {
    let Some(mut task) = task else {
        return Vec::new();
    };
    *dispatched += 1;

    match tokio::time::timeout_at(deadline, &mut task.0).await {
        Ok(Ok(Ok(candidates))) => candidates,
        Ok(Ok(Err(e))) => {
            tracing::warn!(strategy = ?strategy, "strategy failed: {}", e);
            *failed += 1;
            Vec::new()
        }
        Ok(Err(join_error)) => {
            tracing::warn!(strategy = ?strategy, "strategy task died: {}", join_error);
            *failed += 1;
            Vec::new()
        }
        Err(_) => {
            tracing::warn!(strategy = ?strategy, "strategy timed out, partial results discarded");
            *failed += 1;
            Vec::new()
        }
    }
}
