//! Concept strategy: distinctive-term search scored by token-set overlap

use crate::embedding::KeywordStore;
use crate::retrieval::tokenize::{concepts, jaccard, token_set, tokenize};
use crate::retrieval::{CandidateResult, SearchQuery, Strategy, StrategyError};
use std::sync::Arc;

/// Searches per concept term, with one expanded round at half weight
pub struct ConceptStrategy {
    store: Arc<dyn KeywordStore>,
    min_concept_len: usize,
    max_concepts: usize,
}

impl ConceptStrategy {
    pub fn new(store: Arc<dyn KeywordStore>, min_concept_len: usize, max_concepts: usize) -> Self {
        Self {
            store,
            min_concept_len,
            max_concepts,
        }
    }

    /// Return up to `limit` candidates scored by Jaccard similarity between
    /// query and chunk token sets
    pub async fn search(
        &self,
        query: &SearchQuery,
        limit: usize,
    ) -> Result<Vec<CandidateResult>, StrategyError> {
        let terms = concepts(&query.text, self.min_concept_len, self.max_concepts);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let query_tokens = token_set(&query.text);
        let mut candidates: Vec<CandidateResult> = Vec::new();
        let mut seen: std::collections::HashSet<(String, i64)> = std::collections::HashSet::new();

        // First pass at full weight, then one expansion round at half weight.
        // A candidate keeps the weight of the round that first found it.
        for (round, weight) in [(0usize, 1.0f32), (1, 0.5)] {
            for term in &terms {
                let search_text = if round == 0 {
                    term.clone()
                } else {
                    format!("{} related", term)
                };

                let payloads = self.store.search_any(&tokenize(&search_text), limit)?;

                for payload in payloads {
                    let key = (payload.resource_id.clone(), payload.chunk_id);
                    if !seen.insert(key) {
                        continue;
                    }

                    let score = jaccard(&query_tokens, &token_set(&payload.content));
                    if score <= 0.0 {
                        continue;
                    }

                    candidates.push(CandidateResult {
                        resource_id: payload.resource_id,
                        chunk_id: payload.chunk_id,
                        content: payload.content,
                        similarity_score: score,
                        strategy: Strategy::Concept,
                        strategy_weight: weight,
                        highlight: None,
                        created_at: payload.created_at,
                    });
                }
            }
        }

        candidates.sort_by(|a, b| {
            b.similarity_score
                .partial_cmp(&a.similarity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(limit);

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{ChunkPayload, TantivyKeywordIndex};
    use tempfile::TempDir;

    fn indexed_store(entries: &[(i64, &str, &str)]) -> (Arc<TantivyKeywordIndex>, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(TantivyKeywordIndex::new(temp.path().join("keywords")).unwrap());

        for (chunk_id, resource_id, content) in entries {
            store
                .insert(&ChunkPayload {
                    chunk_id: *chunk_id,
                    resource_id: resource_id.to_string(),
                    content: content.to_string(),
                    section_title: None,
                    created_at: 1_700_000_000,
                })
                .unwrap();
        }
        store.commit().unwrap();

        (store, temp)
    }

    #[tokio::test]
    async fn test_concept_terms_drive_recall() {
        let (store, _temp) = indexed_store(&[
            (1, "doc-a", "comprehension improves through repeated exposure"),
            (2, "doc-b", "a chunk about unrelated cooking techniques"),
        ]);

        let strategy = ConceptStrategy::new(store, 5, 3);
        let query = SearchQuery::new("improve reading comprehension", 5);
        let candidates = strategy.search(&query, 10).await.unwrap();

        assert!(!candidates.is_empty());
        assert_eq!(candidates[0].chunk_id, 1);
        assert_eq!(candidates[0].strategy, Strategy::Concept);
    }

    #[tokio::test]
    async fn test_scores_are_jaccard() {
        let (store, _temp) = indexed_store(&[(1, "doc-a", "comprehension exercises")]);

        let strategy = ConceptStrategy::new(store, 5, 3);
        let query = SearchQuery::new("comprehension exercises", 5);
        let candidates = strategy.search(&query, 10).await.unwrap();

        assert_eq!(candidates.len(), 1);
        // Identical token sets give a Jaccard of exactly 1.0
        assert!((candidates[0].similarity_score - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_short_tokens_yield_no_concepts() {
        let (store, _temp) = indexed_store(&[(1, "doc-a", "cat dog fish")]);

        let strategy = ConceptStrategy::new(store, 5, 3);
        let query = SearchQuery::new("cat dog", 5);
        let candidates = strategy.search(&query, 10).await.unwrap();

        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_first_round_wins_weight() {
        let (store, _temp) = indexed_store(&[(1, "doc-a", "comprehension related material")]);

        let strategy = ConceptStrategy::new(store, 5, 3);
        let query = SearchQuery::new("comprehension", 5);
        let candidates = strategy.search(&query, 10).await.unwrap();

        // Found in the first pass, so it keeps full weight even though the
        // expansion round would also match
        assert_eq!(candidates.len(), 1);
        assert!((candidates[0].strategy_weight - 1.0).abs() < f32::EPSILON);
    }
}
