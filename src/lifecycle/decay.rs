//! Decay scoring (spec §4.6.2): a freshness measure in `[0,1]` that is
//! monotonic, deterministic, and bounded by construction.

use chrono::{DateTime, Utc};

use crate::config::{DecayFunction, LifecycleConfig};

/// Compute `decay_score(last_accessed, now)` per `config.decay_function`.
/// Clamped to `[0,1]` regardless of the underlying curve so callers never
/// have to re-check bounds (spec invariant 1).
pub fn decay_score(last_accessed: DateTime<Utc>, now: DateTime<Utc>, config: &LifecycleConfig) -> f32 {
    let delta_days = (now - last_accessed).num_milliseconds() as f32 / 86_400_000.0;
    let delta_days = delta_days.max(0.0);

    let raw = match config.decay_function {
        DecayFunction::Exponential => exponential_decay(delta_days, config.half_life_days),
        // No separate decay-period knob is exposed (spec §6 lists only
        // `decayFunction{kind, params}`); the linear curve reaches zero at
        // twice the configured half-life, so both curves cross 0.5 at the
        // same point.
        DecayFunction::Linear => linear_decay(delta_days, config.half_life_days * 2.0),
    };

    raw.clamp(0.0, 1.0)
}

fn exponential_decay(delta_days: f32, half_life_days: f32) -> f32 {
    let lambda = std::f32::consts::LN_2 / half_life_days;
    (-lambda * delta_days).exp()
}

fn linear_decay(delta_days: f32, decay_period_days: f32) -> f32 {
    if decay_period_days <= 0.0 {
        return 0.0;
    }
    (1.0 - delta_days / decay_period_days).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn config_with(decay_function: DecayFunction) -> LifecycleConfig {
        LifecycleConfig {
            decay_function,
            ..LifecycleConfig::default()
        }
    }

    #[test]
    fn decay_at_half_life_is_approximately_half() {
        let config = config_with(DecayFunction::Exponential);
        let now = Utc::now();
        let last_accessed = now - Duration::days(config.half_life_days as i64);
        let score = decay_score(last_accessed, now, &config);
        assert!((score - 0.5).abs() < 0.05, "got {}", score);
    }

    #[test]
    fn zero_elapsed_time_is_full_freshness() {
        let config = config_with(DecayFunction::Exponential);
        let now = Utc::now();
        assert!((decay_score(now, now, &config) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn access_in_the_future_does_not_exceed_one() {
        let config = config_with(DecayFunction::Exponential);
        let now = Utc::now();
        let future = now + Duration::days(5);
        assert!(decay_score(future, now, &config) <= 1.0);
    }

    proptest! {
        #[test]
        fn decay_is_always_bounded(days in 0.0f32..3650.0, half_life in 1.0f32..365.0, linear in any::<bool>()) {
            let config = LifecycleConfig {
                half_life_days: half_life,
                decay_function: if linear { DecayFunction::Linear } else { DecayFunction::Exponential },
                ..LifecycleConfig::default()
            };
            let now = Utc::now();
            let last_accessed = now - Duration::milliseconds((days * 86_400_000.0) as i64);
            let score = decay_score(last_accessed, now, &config);
            prop_assert!(score >= 0.0 && score <= 1.0);
        }

        #[test]
        fn decay_is_monotonically_non_increasing_with_age(
            days1 in 0.0f32..1000.0,
            extra_days in 0.0f32..1000.0,
            half_life in 1.0f32..365.0,
        ) {
            let config = LifecycleConfig { half_life_days: half_life, ..LifecycleConfig::default() };
            let now = Utc::now();
            let t1 = now - Duration::milliseconds((days1 * 86_400_000.0) as i64);
            let t2 = t1 - Duration::milliseconds((extra_days * 86_400_000.0) as i64);
            let score1 = decay_score(t1, now, &config);
            let score2 = decay_score(t2, now, &config);
            prop_assert!(score2 <= score1 + 1e-4);
        }

        #[test]
        fn decay_is_deterministic(days in 0.0f32..1000.0, half_life in 1.0f32..365.0) {
            let config = LifecycleConfig { half_life_days: half_life, ..LifecycleConfig::default() };
            let now = Utc::now();
            let last_accessed = now - Duration::milliseconds((days * 86_400_000.0) as i64);
            let a = decay_score(last_accessed, now, &config);
            let b = decay_score(last_accessed, now, &config);
            prop_assert_eq!(a, b);
        }
    }
}
