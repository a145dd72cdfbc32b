//! Hybrid retrieval
//!
//! Three independent strategies (vector, keyword, concept) run concurrently
//! per query; their candidates are fused into one deduplicated list, then
//! reranked with a diversity cap. Strategy failures degrade coverage but
//! never abort a query.

mod cache;
mod concept;
mod engine;
mod fusion;
mod keyword;
mod reranker;
mod tokenize;
mod vector;

pub use cache::{query_cache_key, MemoryCache, ResultCache};
pub use concept::ConceptStrategy;
pub use engine::RetrievalEngine;
pub use fusion::fuse;
pub use keyword::KeywordStrategy;
pub use reranker::Reranker;
pub use vector::VectorStrategy;

use crate::embedding::{EmbeddingError, KeywordIndexError, VectorIndexError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Which retrieval strategies a query runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Vector,
    Keyword,
    Concept,
    Hybrid,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Vector => "vector",
            SearchMode::Keyword => "keyword",
            SearchMode::Concept => "concept",
            SearchMode::Hybrid => "hybrid",
        }
    }
}

/// Identifies the strategy that produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Vector,
    Keyword,
    Concept,
}

/// A search request, immutable once constructed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Query text
    pub text: String,
    /// Strategy selection
    pub mode: SearchMode,
    /// Maximum number of results (1..=100)
    pub top_k: usize,
    /// Candidates below this similarity are discarded (0..=1)
    pub similarity_threshold: f32,
    /// Apply the multi-factor reranker to fused results
    pub enable_rerank: bool,
    /// Opaque filters; `resource_ids` (array of strings) restricts results
    /// to the listed documents
    #[serde(default)]
    pub filters: HashMap<String, serde_json::Value>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, top_k: usize) -> Self {
        Self {
            text: text.into(),
            mode: SearchMode::Hybrid,
            top_k,
            similarity_threshold: 0.0,
            enable_rerank: true,
            filters: HashMap::new(),
        }
    }

    /// Reject malformed queries before any strategy runs
    pub fn validate(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("Query text cannot be empty".to_string());
        }
        if !(1..=100).contains(&self.top_k) {
            return Err(format!("top_k must be in 1..=100, got {}", self.top_k));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(format!(
                "similarity_threshold must be in [0, 1], got {}",
                self.similarity_threshold
            ));
        }
        Ok(())
    }

    /// Resource allow-list from the `resource_ids` filter, if present
    pub fn resource_ids(&self) -> Option<Vec<String>> {
        let value = self.filters.get("resource_ids")?;
        let ids: Vec<String> = value
            .as_array()?
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect();
        if ids.is_empty() {
            None
        } else {
            Some(ids)
        }
    }
}

/// A scored candidate produced by a single strategy
#[derive(Debug, Clone)]
pub struct CandidateResult {
    pub resource_id: String,
    pub chunk_id: i64,
    pub content: String,
    pub similarity_score: f32,
    pub strategy: Strategy,
    /// Decays for candidates found by expanded queries
    pub strategy_weight: f32,
    /// Excerpt for UI display (keyword strategy only)
    pub highlight: Option<String>,
    /// Chunk creation time, carried for the freshness factor
    pub created_at: i64,
}

/// One fused entry per unique (resource_id, chunk_id) pair
#[derive(Debug, Clone)]
pub struct FusedResult {
    pub resource_id: String,
    pub chunk_id: i64,
    pub content: String,
    pub fused_score: f32,
    pub contributing_strategies: BTreeSet<Strategy>,
    pub highlight: Option<String>,
    pub created_at: i64,
}

/// Final ranked result, in serialized response order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub resource_id: String,
    pub chunk_id: i64,
    pub content: String,
    pub fused_score: f32,
    pub final_score: f32,
    pub rank: usize,
    pub contributing_strategies: BTreeSet<Strategy>,
    pub highlight: Option<String>,
}

/// The complete response shape; always well-defined, even on total failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<RankedResult>,
    pub total_found: usize,
    pub search_time_ms: f64,
    /// True when fewer strategies contributed than the mode dispatched
    pub degraded: bool,
    /// Set when every dispatched strategy failed
    pub failure_reason: Option<String>,
}

/// Strategy-level failure, caught at the orchestrator boundary
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector search failed: {0}")]
    VectorSearch(#[from] VectorIndexError),

    #[error("Keyword search failed: {0}")]
    KeywordSearch(#[from] KeywordIndexError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_validation() {
        let mut query = SearchQuery::new("listening skills", 5);
        assert!(query.validate().is_ok());

        query.top_k = 0;
        assert!(query.validate().is_err());

        query.top_k = 101;
        assert!(query.validate().is_err());

        query.top_k = 5;
        query.similarity_threshold = 1.5;
        assert!(query.validate().is_err());

        query.similarity_threshold = 0.75;
        query.text = "   ".to_string();
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_resource_ids_filter_parsing() {
        let mut query = SearchQuery::new("anything", 5);
        assert!(query.resource_ids().is_none());

        query.filters.insert(
            "resource_ids".to_string(),
            serde_json::json!(["doc-a", "doc-b"]),
        );
        assert_eq!(
            query.resource_ids().unwrap(),
            vec!["doc-a".to_string(), "doc-b".to_string()]
        );

        query
            .filters
            .insert("resource_ids".to_string(), serde_json::json!([]));
        assert!(query.resource_ids().is_none());
    }
}
