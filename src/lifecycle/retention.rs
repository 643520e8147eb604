//! Retention policy arithmetic (spec §4.6.4): importance stretches a
//! memory's TTL, it never shrinks it.

use std::collections::HashMap;

use crate::config::StoreConfig;

/// TTL parameters for one memory type (or the workspace-wide default).
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// Base TTL in milliseconds before importance stretching.
    pub ttl_ms: i64,
    /// Multiplier applied at `importance_score == 1.0` (spec §4.6.4).
    pub importance_multiplier: f32,
    /// Extra time, in milliseconds, a never-accessed memory is kept past
    /// its effective TTL before the evaluator will archive it outright.
    pub grace_period_ms: i64,
}

impl RetentionPolicy {
    pub fn from_store_config(config: &StoreConfig) -> Self {
        Self {
            ttl_ms: config.default_ttl_ms,
            importance_multiplier: config.importance_ttl_multiplier,
            grace_period_ms: 24 * 60 * 60 * 1000,
        }
    }
}

/// A per-type registry of retention policies with a default fallback
/// (spec §4.6.4: "retentionPolicies by type").
#[derive(Debug, Clone)]
pub struct RetentionPolicies {
    pub default: RetentionPolicy,
    pub by_type: HashMap<String, RetentionPolicy>,
}

impl RetentionPolicies {
    pub fn from_store_config(config: &StoreConfig) -> Self {
        Self {
            default: RetentionPolicy::from_store_config(config),
            by_type: HashMap::new(),
        }
    }

    pub fn policy_for(&self, memory_type: &str) -> &RetentionPolicy {
        self.by_type.get(memory_type).unwrap_or(&self.default)
    }
}

/// `effective_ttl = ttl_ms * (1 + importance_score * importance_multiplier)`
/// (spec §4.6.4). `importance_score` is clamped to `[0,1]` first so a caller
/// passing a slightly out-of-range score (e.g. float drift) can't violate
/// the `effective_ttl >= ttl_ms` invariant (spec invariant 5).
pub fn effective_ttl_ms(policy: &RetentionPolicy, importance_score: f32) -> i64 {
    let importance_score = importance_score.clamp(0.0, 1.0);
    let multiplier = 1.0 + importance_score * policy.importance_multiplier;
    ((policy.ttl_ms as f64) * (multiplier as f64)).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy() -> RetentionPolicy {
        RetentionPolicy {
            ttl_ms: 30 * 24 * 60 * 60 * 1000,
            importance_multiplier: 2.0,
            grace_period_ms: 24 * 60 * 60 * 1000,
        }
    }

    #[test]
    fn zero_importance_leaves_ttl_unchanged() {
        let p = policy();
        assert_eq!(effective_ttl_ms(&p, 0.0), p.ttl_ms);
    }

    #[test]
    fn max_importance_hits_the_multiplier_ceiling() {
        let p = policy();
        let expected = (p.ttl_ms as f32 * (1.0 + p.importance_multiplier)) as i64;
        assert!((effective_ttl_ms(&p, 1.0) - expected).abs() <= 1);
    }

    #[test]
    fn unknown_type_falls_back_to_default_policy() {
        let policies = RetentionPolicies::from_store_config(&StoreConfig::default());
        assert_eq!(policies.policy_for("nonexistent_type").ttl_ms, policies.default.ttl_ms);
    }

    proptest! {
        #[test]
        fn effective_ttl_is_bounded_by_ttl_and_ttl_times_multiplier(
            ttl_ms in 1_000i64..1_000_000_000,
            importance_multiplier in 1.0f32..10.0,
            importance_score in 0.0f32..1.0,
        ) {
            let p = RetentionPolicy { ttl_ms, importance_multiplier, grace_period_ms: 0 };
            let ttl = effective_ttl_ms(&p, importance_score);
            prop_assert!(ttl >= p.ttl_ms);
            let ceiling = (p.ttl_ms as f64 * (1.0 + p.importance_multiplier as f64)).round() as i64;
            prop_assert!(ttl <= ceiling);
        }
    }
}
