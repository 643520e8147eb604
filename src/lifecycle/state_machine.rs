//! The lifecycle transition table as a pure function (spec §4.6.1, §9):
//! `(from, to, trigger) -> {valid, reason}`. An exhaustive match, not
//! ad-hoc conditionals, so every cell of the spec's table has exactly one
//! home.

use crate::types::{LifecycleState, TriggeredBy};

/// The outcome of checking one candidate transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionDecision {
    pub valid: bool,
    pub reason: &'static str,
}

impl TransitionDecision {
    fn valid(reason: &'static str) -> Self {
        Self { valid: true, reason }
    }

    fn invalid(reason: &'static str) -> Self {
        Self { valid: false, reason }
    }
}

/// Validate a candidate transition against spec §4.6.1's table. Every
/// automatic (system) transition the lifecycle evaluator wants to apply,
/// and every user-initiated one the caller wants to apply, goes through
/// this function first; invalid transitions are never applied, only
/// logged (spec: "invalid transitions are skipped with a warning, never
/// applied").
pub fn validate_transition(
    from: LifecycleState,
    to: LifecycleState,
    trigger: TriggeredBy,
) -> TransitionDecision {
    use LifecycleState::*;
    use TriggeredBy::*;

    match (from, to, trigger) {
        (Expired, _, _) => TransitionDecision::invalid("expired is terminal"),

        (Pinned, Active, User) => TransitionDecision::valid("user unpin, decay score recovered"),
        (Pinned, Decaying, User) => TransitionDecision::valid("user unpin, decay score stale"),
        (Pinned, Active, System) | (Pinned, Decaying, System) => {
            TransitionDecision::invalid("automatic transitions are suspended while pinned")
        }
        (Pinned, Archived, _) | (Pinned, Expired, _) => {
            TransitionDecision::invalid("pinned memories cannot be archived or expired")
        }

        (from, Pinned, User) if from != Pinned => TransitionDecision::valid("user pin"),
        (_, Pinned, System) => TransitionDecision::invalid("pinning is always user-triggered"),

        (Active, Decaying, System) => TransitionDecision::valid("decay score crossed decaying_threshold"),
        (Decaying, Active, System) => TransitionDecision::valid("decay score recovered above threshold"),
        (Decaying, Archived, System) => TransitionDecision::valid("ttl exceeded while decaying"),
        (Active, Archived, System) => TransitionDecision::valid("ttl grace period exceeded"),
        (Active, Archived, User) => TransitionDecision::valid("user archive"),
        (Archived, Active, User) => TransitionDecision::valid("user restore"),
        (Archived, Expired, System) => TransitionDecision::valid("archive retention period exceeded"),

        _ => TransitionDecision::invalid("transition not permitted"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_rejects_every_destination_and_trigger() {
        for to in [
            LifecycleState::Active,
            LifecycleState::Decaying,
            LifecycleState::Archived,
            LifecycleState::Pinned,
        ] {
            for trigger in [TriggeredBy::System, TriggeredBy::User] {
                assert!(!validate_transition(LifecycleState::Expired, to, trigger).valid);
            }
        }
    }

    #[test]
    fn pinned_rejects_automatic_transitions_but_allows_user_unpin() {
        assert!(!validate_transition(LifecycleState::Pinned, LifecycleState::Active, TriggeredBy::System).valid);
        assert!(validate_transition(LifecycleState::Pinned, LifecycleState::Active, TriggeredBy::User).valid);
        assert!(validate_transition(LifecycleState::Pinned, LifecycleState::Decaying, TriggeredBy::User).valid);
    }

    #[test]
    fn pinned_never_reaches_archived_or_expired() {
        for trigger in [TriggeredBy::System, TriggeredBy::User] {
            assert!(!validate_transition(LifecycleState::Pinned, LifecycleState::Archived, trigger).valid);
            assert!(!validate_transition(LifecycleState::Pinned, LifecycleState::Expired, trigger).valid);
        }
    }

    #[test]
    fn active_to_decaying_is_system_only() {
        assert!(validate_transition(LifecycleState::Active, LifecycleState::Decaying, TriggeredBy::System).valid);
        assert!(!validate_transition(LifecycleState::Active, LifecycleState::Decaying, TriggeredBy::User).valid);
    }

    #[test]
    fn active_to_archived_is_permitted_for_either_trigger() {
        assert!(validate_transition(LifecycleState::Active, LifecycleState::Archived, TriggeredBy::System).valid);
        assert!(validate_transition(LifecycleState::Active, LifecycleState::Archived, TriggeredBy::User).valid);
    }

    #[test]
    fn archived_to_active_is_user_only() {
        assert!(validate_transition(LifecycleState::Archived, LifecycleState::Active, TriggeredBy::User).valid);
        assert!(!validate_transition(LifecycleState::Archived, LifecycleState::Active, TriggeredBy::System).valid);
    }

    #[test]
    fn any_non_pinned_state_can_be_pinned_by_a_user() {
        for from in [LifecycleState::Active, LifecycleState::Decaying, LifecycleState::Archived] {
            assert!(validate_transition(from, LifecycleState::Pinned, TriggeredBy::User).valid);
            assert!(!validate_transition(from, LifecycleState::Pinned, TriggeredBy::System).valid);
        }
    }
}
