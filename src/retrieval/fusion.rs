//! Score fusion across strategy candidate lists
//!
//! Merges the three strategies' candidates into one list with exactly one
//! entry per (resource_id, chunk_id) pair, then rewards cross-strategy
//! agreement: at equal raw score, multi-method consensus outranks
//! single-method confidence.

use crate::config::FusionConfig;
use crate::retrieval::{CandidateResult, FusedResult, Strategy};
use std::collections::hash_map::Entry;
use std::collections::BTreeSet;

/// Fuse the per-strategy candidate lists into one deduplicated list,
/// sorted by fused score descending.
///
/// Merge rules for a key that already exists:
/// - keyword/concept candidates average into the existing score
/// - vector candidates take the max (vector similarity is authoritative,
///   which is why vector candidates are merged last)
///
/// Every entry backed by more than one strategy receives a multiplicative
/// consensus bonus of `1 + consensus_bonus * (contributing - 1)`.
pub fn fuse(
    vector: Vec<CandidateResult>,
    keyword: Vec<CandidateResult>,
    concept: Vec<CandidateResult>,
    config: &FusionConfig,
) -> Vec<FusedResult> {
    let mut merged: ahash::HashMap<(String, i64), FusedResult> = ahash::HashMap::default();

    let candidates = keyword
        .into_iter()
        .chain(concept)
        .chain(vector);

    for candidate in candidates {
        let key = (candidate.resource_id.clone(), candidate.chunk_id);
        let weighted = candidate.similarity_score * candidate.strategy_weight;

        match merged.entry(key) {
            Entry::Vacant(slot) => {
                let mut contributing = BTreeSet::new();
                contributing.insert(candidate.strategy);

                slot.insert(FusedResult {
                    resource_id: candidate.resource_id,
                    chunk_id: candidate.chunk_id,
                    content: candidate.content,
                    fused_score: weighted,
                    contributing_strategies: contributing,
                    highlight: candidate.highlight,
                    created_at: candidate.created_at,
                });
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                existing.fused_score = match candidate.strategy {
                    Strategy::Vector => existing.fused_score.max(weighted),
                    Strategy::Keyword | Strategy::Concept => {
                        (existing.fused_score + weighted) / 2.0
                    }
                };
                existing.contributing_strategies.insert(candidate.strategy);
                if existing.highlight.is_none() {
                    existing.highlight = candidate.highlight;
                }
            }
        }
    }

    let mut fused: Vec<FusedResult> = merged
        .into_values()
        .map(|mut result| {
            let contributing = result.contributing_strategies.len();
            if contributing > 1 {
                result.fused_score *= 1.0 + config.consensus_bonus * (contributing - 1) as f32;
            }
            result
        })
        .collect();

    fused.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    fused
}
