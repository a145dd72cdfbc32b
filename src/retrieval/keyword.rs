//! Keyword strategy: stop-word-filtered token matching with highlights

use crate::embedding::KeywordStore;
use crate::retrieval::tokenize::{keywords, token_set};
use crate::retrieval::{CandidateResult, SearchQuery, Strategy, StrategyError};
use std::sync::Arc;

/// Maximum highlight excerpt length in characters
const HIGHLIGHT_WINDOW: usize = 200;

/// Matches query keywords against the keyword store
pub struct KeywordStrategy {
    store: Arc<dyn KeywordStore>,
}

impl KeywordStrategy {
    pub fn new(store: Arc<dyn KeywordStore>) -> Self {
        Self { store }
    }

    /// Return up to `limit` candidates scored by keyword coverage
    pub async fn search(
        &self,
        query: &SearchQuery,
        limit: usize,
    ) -> Result<Vec<CandidateResult>, StrategyError> {
        let query_keywords = keywords(&query.text);
        if query_keywords.is_empty() {
            // A query of pure stop words matches nothing; that is not a failure
            return Ok(Vec::new());
        }

        let payloads = self.store.search_any(&query_keywords, limit)?;
        let total = query_keywords.len() as f32;

        let mut candidates: Vec<CandidateResult> = payloads
            .into_iter()
            .filter_map(|payload| {
                let chunk_tokens = token_set(&payload.content);
                let matched: Vec<&String> = query_keywords
                    .iter()
                    .filter(|kw| chunk_tokens.contains(*kw))
                    .collect();
                if matched.is_empty() {
                    return None;
                }

                let highlight = make_highlight(&payload.content, matched[0]);

                Some(CandidateResult {
                    resource_id: payload.resource_id,
                    chunk_id: payload.chunk_id,
                    content: payload.content,
                    similarity_score: matched.len() as f32 / total,
                    strategy: Strategy::Keyword,
                    strategy_weight: 1.0,
                    highlight: Some(highlight),
                    created_at: payload.created_at,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.similarity_score
                .partial_cmp(&a.similarity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(limit);

        Ok(candidates)
    }
}

/// Excerpt around the first occurrence of a keyword, bounded to
/// `HIGHLIGHT_WINDOW` characters and kept on char boundaries
fn make_highlight(content: &str, keyword: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    let lowered: String = content.to_lowercase();
    let lowered_chars: Vec<char> = lowered.chars().collect();
    let needle: Vec<char> = keyword.chars().collect();

    let match_pos = (0..lowered_chars.len().saturating_sub(needle.len() - 1))
        .find(|&i| lowered_chars[i..i + needle.len()] == needle[..])
        .unwrap_or(0);

    let half = HIGHLIGHT_WINDOW / 2;
    let start = match_pos.saturating_sub(half);
    let end = (start + HIGHLIGHT_WINDOW).min(chars.len());

    let mut excerpt: String = chars[start..end].iter().collect();
    if start > 0 {
        excerpt = format!("...{}", excerpt);
    }
    if end < chars.len() {
        excerpt.push_str("...");
    }
    excerpt
}
