//! Retrieval Ranker (spec §4.7 step 3): combine similarity, recency, and
//! confidence into a single score, or rank by a single signal, or defer to a
//! caller-registered function. Grounded on the teacher's
//! `search::rerank::Reranker`, which scores the same kind of signals
//! (recency, importance, term overlap) and lets a caller pick a strategy.

use std::sync::Arc;

use chrono::Utc;

use crate::config::ContextConfig;
use crate::types::Memory;

/// A memory plus its vector similarity, carried through ranking.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub similarity: f32,
    pub score: f32,
}

/// A caller-registered ranking function: `(memory, similarity) -> score`.
pub type CustomRankFn = Arc<dyn Fn(&Memory, f32) -> f32 + Send + Sync>;

/// How candidate memories are scored before context assembly (spec §4.7
/// step 3).
#[derive(Clone)]
pub enum RankStrategy {
    /// Weighted composite of similarity, recency, and confidence, per
    /// `ContextConfig`'s weights.
    Composite,
    SimilarityOnly,
    RecencyOnly,
    ConfidenceOnly,
    Custom(CustomRankFn),
}

impl std::fmt::Debug for RankStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RankStrategy::Composite => write!(f, "Composite"),
            RankStrategy::SimilarityOnly => write!(f, "SimilarityOnly"),
            RankStrategy::RecencyOnly => write!(f, "RecencyOnly"),
            RankStrategy::ConfidenceOnly => write!(f, "ConfidenceOnly"),
            RankStrategy::Custom(_) => write!(f, "Custom"),
        }
    }
}

impl Default for RankStrategy {
    fn default() -> Self {
        RankStrategy::Composite
    }
}

/// Recency signal: `1 / (1 + Δdays)` (spec §4.7 step 3), 1.0 for a memory
/// updated this instant, decaying toward 0 as it ages.
pub fn recency_score(memory: &Memory) -> f32 {
    let delta_days = (Utc::now() - memory.updated_at).num_seconds().max(0) as f32 / 86_400.0;
    1.0 / (1.0 + delta_days)
}

/// Score `candidates` per `strategy`, highest first. `candidates` are
/// `(memory, similarity)` pairs in whatever order the vector search
/// returned them.
pub fn rank(candidates: Vec<(Memory, f32)>, strategy: &RankStrategy, config: &ContextConfig) -> Vec<ScoredMemory> {
    let mut scored: Vec<ScoredMemory> = candidates
        .into_iter()
        .map(|(memory, similarity)| {
            let score = match strategy {
                RankStrategy::Composite => {
                    config.rank_similarity_weight * similarity
                        + config.rank_recency_weight * recency_score(&memory)
                        + config.rank_confidence_weight * memory.confidence
                }
                RankStrategy::SimilarityOnly => similarity,
                RankStrategy::RecencyOnly => recency_score(&memory),
                RankStrategy::ConfidenceOnly => memory.confidence,
                RankStrategy::Custom(f) => f(&memory, similarity),
            };
            ScoredMemory { memory, similarity, score }
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored
}
