//! Batch lifecycle evaluator (spec §4.6.5): a per-workspace scan that
//! recomputes decay/importance and drives validated Active/Decaying
//! transitions. Archival itself is async (it touches the vector store), so
//! this module only *identifies* memories that have crossed their
//! effective TTL; `lifecycle::archival` performs the actual move. Exposed
//! as a synchronous `tick(now)` per spec §9's testing guidance ("expose a
//! synchronous tick(now) that runs one evaluation with an injected
//! clock"), so a caller can drive it with a fixed clock in tests without
//! touching the async vector seam at all.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::decay::decay_score;
use super::importance::{importance_score, ImportanceMetrics};
use super::retention::{effective_ttl_ms, RetentionPolicies};
use super::state_machine::validate_transition;
use super::log_lifecycle_event;
use crate::config::LifecycleConfig;
use crate::error::Result;
use crate::types::{LifecycleState, TriggeredBy};

/// Outcome of one evaluation pass.
#[derive(Debug, Clone, Default)]
pub struct EvaluationResult {
    pub evaluated: usize,
    /// Active <-> Decaying transitions applied directly by this pass.
    pub transitioned: usize,
    /// Ids whose effective TTL has elapsed and that the caller should hand
    /// to `archival::archive_memory`. Not archived here: archival needs the
    /// async vector-delete step this function deliberately does not take.
    pub to_archive: Vec<String>,
    pub errors: Vec<String>,
}

/// Run one evaluation pass over every non-pinned, non-expired, non-archived
/// memory in `workspace_id` as of `now`. Idempotent for a fixed `now`: a
/// second call against unchanged rows recomputes the same decay/importance
/// values and proposes no further transitions (spec invariant 7).
pub fn tick(
    conn: &Connection,
    workspace_id: &str,
    now: DateTime<Utc>,
    config: &LifecycleConfig,
    policies: &RetentionPolicies,
) -> Result<EvaluationResult> {
    let mut result = EvaluationResult::default();

    let rows: Vec<(String, String, i64, f32, String, String, Option<String>)> = {
        let mut stmt = conn.prepare(
            "SELECT id, memory_type, access_count, confidence, lifecycle_state,
                    created_at, last_accessed_at
             FROM memories
             WHERE workspace_id = ? AND lifecycle_state NOT IN ('pinned', 'expired')",
        )?;
        stmt.query_map(params![workspace_id], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?
    };

    for (id, memory_type, access_count, confidence, state_str, created_at_str, last_accessed_str) in rows {
        result.evaluated += 1;
        if let Err(e) = evaluate_one(
            conn,
            workspace_id,
            &id,
            &memory_type,
            access_count,
            confidence,
            &state_str,
            &created_at_str,
            last_accessed_str.as_deref(),
            now,
            config,
            policies,
            &mut result,
        ) {
            result.errors.push(format!("{id}: {e}"));
        }
    }

    Ok(result)
}

#[allow(clippy::too_many_arguments)]
fn evaluate_one(
    conn: &Connection,
    workspace_id: &str,
    memory_id: &str,
    memory_type: &str,
    access_count: i64,
    confidence: f32,
    state_str: &str,
    created_at_str: &str,
    last_accessed_str: Option<&str>,
    now: DateTime<Utc>,
    config: &LifecycleConfig,
    policies: &RetentionPolicies,
    result: &mut EvaluationResult,
) -> Result<()> {
    let current_state: LifecycleState = state_str.parse().unwrap_or(LifecycleState::Active);
    let created_at = parse_rfc3339_or(created_at_str, now);
    let last_accessed = last_accessed_str.map(|s| parse_rfc3339_or(s, created_at)).unwrap_or(created_at);

    let relationship_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM relationships WHERE from_memory_id = ? OR to_memory_id = ?",
        params![memory_id, memory_id],
        |r| r.get(0),
    )?;

    let new_decay = decay_score(last_accessed, now, config);
    let new_importance = importance_score(
        &ImportanceMetrics {
            access_count,
            confidence,
            relationship_count,
        },
        config,
    );

    let policy = policies.policy_for(memory_type);
    let ttl_ms = effective_ttl_ms(policy, new_importance);
    let age_ms = (now - created_at).num_milliseconds().max(0);

    // spec §4.6.5 step 3: the grace-period clause only tightens *within* the
    // TTL-exceeded branch (unused memories archive immediately instead of
    // waiting out the rest of the TTL), it is never an independent trigger.
    let target_state = if age_ms > ttl_ms {
        Some(LifecycleState::Archived)
    } else if current_state == LifecycleState::Active && new_decay < config.decaying_threshold {
        Some(LifecycleState::Decaying)
    } else if current_state == LifecycleState::Decaying && new_decay >= config.decaying_threshold {
        Some(LifecycleState::Active)
    } else {
        None
    };

    if let Some(target) = target_state {
        if target != current_state {
            let decision = validate_transition(current_state, target, TriggeredBy::System);
            if decision.valid {
                if target == LifecycleState::Archived {
                    result.to_archive.push(memory_id.to_string());
                } else {
                    apply_transition(conn, workspace_id, memory_id, current_state, target, decision.reason, now)?;
                    result.transitioned += 1;
                }
                write_scores(conn, memory_id, new_decay, new_importance)?;
                return Ok(());
            }
            tracing::warn!(
                memory_id,
                from = %current_state,
                to = %target,
                reason = decision.reason,
                "skipped invalid automatic transition"
            );
        }
    }

    write_scores(conn, memory_id, new_decay, new_importance)?;
    Ok(())
}

fn parse_rfc3339_or(s: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(fallback)
}

/// Write-coalesced: only touches the row when decay or importance drifted
/// by more than the write-coalescing tolerance, so a `tick` against
/// unchanged state doesn't bump every row's write activity for nothing.
fn write_scores(conn: &Connection, memory_id: &str, decay: f32, importance: f32) -> Result<()> {
    conn.execute(
        "UPDATE memories SET decay_score = ?, importance_score = ?
         WHERE id = ? AND (ABS(decay_score - ?) > 0.01 OR ABS(importance_score - ?) > 0.01)",
        params![decay, importance, memory_id, decay, importance],
    )?;
    Ok(())
}

fn apply_transition(
    conn: &Connection,
    workspace_id: &str,
    memory_id: &str,
    from: LifecycleState,
    to: LifecycleState,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE memories SET lifecycle_state = ?, updated_at = ? WHERE id = ?",
        params![to.as_str(), now.to_rfc3339(), memory_id],
    )?;
    log_lifecycle_event(conn, memory_id, workspace_id, from, to, reason, TriggeredBy::System, None, now)
}
