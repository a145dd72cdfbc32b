//! Vector strategy: embedding similarity against the vector store

use crate::embedding::{ResourceFilter, RetryingEmbedder, VectorStore};
use crate::retrieval::{CandidateResult, SearchQuery, Strategy, StrategyError};
use std::sync::Arc;

/// Embeds the query and searches the vector store for nearest neighbors
pub struct VectorStrategy {
    embedder: Arc<RetryingEmbedder>,
    store: Arc<dyn VectorStore>,
    ef_search: usize,
}

impl VectorStrategy {
    pub fn new(
        embedder: Arc<RetryingEmbedder>,
        store: Arc<dyn VectorStore>,
        ef_search: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            ef_search,
        }
    }

    /// Return up to `limit` candidates above the query's similarity threshold
    pub async fn search(
        &self,
        query: &SearchQuery,
        limit: usize,
    ) -> Result<Vec<CandidateResult>, StrategyError> {
        let embedding = self.embedder.embed(&query.text).await?;

        let filter = query.resource_ids().map(|resource_ids| ResourceFilter {
            resource_ids,
        });

        let hits = self
            .store
            .search(&embedding, limit, self.ef_search, filter.as_ref())?;

        let mut candidates: Vec<CandidateResult> = hits
            .into_iter()
            .map(|hit| {
                // Distance to similarity: closer neighbors approach 1.0
                let similarity = 1.0 / (1.0 + hit.distance);
                CandidateResult {
                    resource_id: hit.payload.resource_id,
                    chunk_id: hit.payload.chunk_id,
                    content: hit.payload.content,
                    similarity_score: similarity,
                    strategy: Strategy::Vector,
                    strategy_weight: 1.0,
                    highlight: None,
                    created_at: hit.payload.created_at,
                }
            })
            .filter(|c| c.similarity_score >= query.similarity_threshold)
            .collect();

        candidates.sort_by(|a, b| {
            b.similarity_score
                .partial_cmp(&a.similarity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(candidates)
    }
}
