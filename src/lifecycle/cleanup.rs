//! Cleanup service (spec §4.6.7): hard-deletes archived memories once
//! they've sat past their archive retention period, and prunes
//! `lifecycle_events` rows older than the audit retention window.
//!
//! An archived memory has no `lifecycle_state` column of its own (see
//! `archived_memories`'s schema) so "expired" is never a value sitting in
//! a row; it's the instant between logging the Archived -> Expired audit
//! event and deleting the row. That keeps `LifecycleState::Expired`
//! genuinely terminal: once reached, the memory doesn't exist to transition
//! out of.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};

use super::log_lifecycle_event;
use super::state_machine::validate_transition;
use crate::config::LifecycleConfig;
use crate::error::Result;
use crate::types::{LifecycleState, TriggeredBy};

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupResult {
    pub hard_deleted: usize,
    pub events_pruned: usize,
}

/// Run one cleanup pass for `workspace_id`. Never touches the `memories`
/// table: only rows already in `archived_memories` are eligible for hard
/// deletion (spec invariant 12: "cleanup never deletes a non-expired
/// memory").
pub fn run_cleanup(
    conn: &Connection,
    workspace_id: &str,
    now: DateTime<Utc>,
    config: &LifecycleConfig,
) -> Result<CleanupResult> {
    let mut result = CleanupResult::default();

    let archived: Vec<(String, String)> = {
        let mut stmt = conn.prepare("SELECT id, archived_at FROM archived_memories WHERE workspace_id = ?")?;
        stmt.query_map(params![workspace_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?
    };

    for (id, archived_at_str) in archived {
        let archived_at = DateTime::parse_from_rfc3339(&archived_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now);
        let age_days = (now - archived_at).num_days();
        if age_days <= config.cleanup_grace_period_days {
            continue;
        }

        let decision = validate_transition(LifecycleState::Archived, LifecycleState::Expired, TriggeredBy::System);
        if !decision.valid {
            continue;
        }

        log_lifecycle_event(
            conn,
            &id,
            workspace_id,
            LifecycleState::Archived,
            LifecycleState::Expired,
            decision.reason,
            TriggeredBy::System,
            None,
            now,
        )?;
        conn.execute("DELETE FROM archived_memories WHERE id = ?", params![id])?;
        conn.execute(
            "DELETE FROM relationships WHERE from_memory_id = ? OR to_memory_id = ?",
            params![id, id],
        )?;
        result.hard_deleted += 1;
    }

    let cutoff = (now - Duration::days(config.event_retention_days)).to_rfc3339();
    result.events_pruned = conn.execute(
        "DELETE FROM lifecycle_events WHERE workspace_id = ? AND created_at < ?",
        params![workspace_id, cutoff],
    )?;

    Ok(result)
}
