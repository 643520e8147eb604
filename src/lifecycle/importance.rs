//! Importance scoring (spec §4.6.3): a weighted combination of access
//! frequency, confidence, and relationship count, monotonic under access.

use crate::config::LifecycleConfig;

/// Raw inputs to the importance calculation for one memory.
#[derive(Debug, Clone, Copy)]
pub struct ImportanceMetrics {
    pub access_count: i64,
    pub confidence: f32,
    pub relationship_count: i64,
}

/// Saturating curve mapping a non-negative count to `[0,1)`, asymptotic
/// rather than capped at a hard max so there's no discontinuity (grounded
/// on the teacher's log-scaled frequency score in `salience.rs`, simplified
/// to a single saturating fraction since weights already control how much
/// each component contributes).
fn saturate(count: i64) -> f32 {
    let count = count.max(0) as f32;
    count / (count + 10.0)
}

/// Combine `metrics` under `config`'s weights into a score in `[0,1]`.
/// Monotonic under `access_count` because `saturate` is monotonically
/// increasing and weights are non-negative (spec invariant 4).
pub fn importance_score(metrics: &ImportanceMetrics, config: &LifecycleConfig) -> f32 {
    let frequency = saturate(metrics.access_count);
    let relationship = saturate(metrics.relationship_count);
    let confidence = metrics.confidence.clamp(0.0, 1.0);

    let score = config.importance_frequency_weight * frequency
        + config.importance_confidence_weight * confidence
        + config.importance_relationship_weight * relationship;

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn more_accesses_never_decreases_importance() {
        let config = LifecycleConfig::default();
        let low = ImportanceMetrics {
            access_count: 2,
            confidence: 0.6,
            relationship_count: 1,
        };
        let high = ImportanceMetrics {
            access_count: 50,
            confidence: 0.6,
            relationship_count: 1,
        };
        assert!(importance_score(&high, &config) >= importance_score(&low, &config));
    }

    proptest! {
        #[test]
        fn importance_is_always_bounded(
            access_count in 0i64..100_000,
            confidence in 0.0f32..1.0,
            relationship_count in 0i64..10_000,
        ) {
            let config = LifecycleConfig::default();
            let metrics = ImportanceMetrics { access_count, confidence, relationship_count };
            let score = importance_score(&metrics, &config);
            prop_assert!(score >= 0.0 && score <= 1.0);
        }

        #[test]
        fn importance_is_monotonic_under_access(
            access_count in 0i64..100_000,
            extra_access in 0i64..100_000,
            confidence in 0.0f32..1.0,
            relationship_count in 0i64..10_000,
        ) {
            let config = LifecycleConfig::default();
            let before = ImportanceMetrics { access_count, confidence, relationship_count };
            let after = ImportanceMetrics { access_count: access_count + extra_access, confidence, relationship_count };
            prop_assert!(importance_score(&after, &config) >= importance_score(&before, &config) - 1e-6);
        }
    }
}
