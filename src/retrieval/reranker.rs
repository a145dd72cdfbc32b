//! Multi-factor reranking with a per-resource diversity cap
//!
//! The final score is a weighted sum of four independent signals: fused
//! similarity, content quality, freshness, and per-resource preference.

use crate::config::RerankConfig;
use crate::retrieval::{FusedResult, RankedResult};
use std::collections::HashMap;

/// Seconds per day, for freshness decay
const DAY_SECS: f64 = 86_400.0;

/// Recomputes final scores and enforces result diversity
pub struct Reranker {
    config: RerankConfig,
}

impl Reranker {
    pub fn new(config: RerankConfig) -> Self {
        Self { config }
    }

    /// Rerank fused results by the four-factor score, then cap any single
    /// resource to `max_per_resource` entries (only for result sets larger
    /// than `min_results_for_diversity`; scarce matches are never discarded).
    ///
    /// `preferences` maps resource ids to scores in [0, 1]; absent resources
    /// score a neutral 0.5. `now` is a unix timestamp for freshness decay.
    pub fn rerank(
        &self,
        fused: Vec<FusedResult>,
        preferences: &HashMap<String, f32>,
        now: i64,
    ) -> Vec<RankedResult> {
        let apply_diversity = fused.len() > self.config.min_results_for_diversity;

        let mut scored: Vec<(f32, FusedResult)> = fused
            .into_iter()
            .map(|result| {
                let similarity = result.fused_score * self.config.similarity_weight;
                let quality = quality(&result.content) * self.config.quality_weight;
                let freshness = freshness(result.created_at, now) * self.config.freshness_weight;
                let preference = preferences
                    .get(&result.resource_id)
                    .copied()
                    .unwrap_or(0.5)
                    * self.config.preference_weight;

                (similarity + quality + freshness + preference, result)
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut per_resource: HashMap<String, usize> = HashMap::new();
        let mut ranked = Vec::new();

        for (final_score, result) in scored {
            if apply_diversity {
                let count = per_resource.entry(result.resource_id.clone()).or_insert(0);
                if *count >= self.config.max_per_resource {
                    continue;
                }
                *count += 1;
            }

            ranked.push(RankedResult {
                resource_id: result.resource_id,
                chunk_id: result.chunk_id,
                content: result.content,
                fused_score: result.fused_score,
                final_score,
                rank: ranked.len() + 1,
                contributing_strategies: result.contributing_strategies,
                highlight: result.highlight,
            });
        }

        ranked
    }

    /// Pass-through for queries that skip reranking: sort by fused score
    /// and assign ranks, nothing else
    pub fn passthrough(&self, mut fused: Vec<FusedResult>) -> Vec<RankedResult> {
        fused.sort_by(|a, b| {
            b.fused_score
                .partial_cmp(&a.fused_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        fused
            .into_iter()
            .enumerate()
            .map(|(i, result)| RankedResult {
                resource_id: result.resource_id,
                chunk_id: result.chunk_id,
                content: result.content,
                fused_score: result.fused_score,
                final_score: result.fused_score,
                rank: i + 1,
                contributing_strategies: result.contributing_strategies,
                highlight: result.highlight,
            })
            .collect()
    }
}

/// Content quality in [0, 1]: the mean of three sub-factors
///
/// - length: full credit between 50 and 2000 characters, ramping outside
/// - structure: paragraph breaks beat single line breaks beat none
/// - completeness: ends on terminal punctuation
fn quality(content: &str) -> f32 {
    let len = content.chars().count();

    let length_factor = if len < 50 {
        len as f32 / 50.0
    } else if len <= 2000 {
        1.0
    } else {
        2000.0 / len as f32
    };

    let structure_factor = if content.contains("\n\n") {
        1.0
    } else if content.contains('\n') {
        0.5
    } else {
        0.0
    };

    let completeness_factor = match content.trim_end().chars().last() {
        Some('.') | Some('!') | Some('?') | Some('。') | Some('！') | Some('？') => 1.0,
        _ => 0.0,
    };

    (length_factor + structure_factor + completeness_factor) / 3.0
}

/// Freshness in [0.1, 1.0]: linear decay over a year with a floor
fn freshness(created_at: i64, now: i64) -> f32 {
    let age_days = ((now - created_at).max(0) as f64) / DAY_SECS;
    (1.0 - age_days / 365.0).max(0.1) as f32
}
