//! The lifecycle engine (spec §4.6): decay and importance scoring, the
//! transition state machine, retention arithmetic, the batch evaluator,
//! archival/restore, cleanup, and the background scheduler that ties them
//! together. Grounded on the teacher's `intelligence::salience` module for
//! the scoring shapes and `sync::worker` for the periodic-task pattern.

pub mod archival;
pub mod background;
pub mod cleanup;
pub mod decay;
pub mod evaluator;
pub mod importance;
pub mod retention;
pub mod state_machine;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::ids;
use crate::types::{LifecycleState, TriggeredBy};

/// Append a row to `lifecycle_events`. Shared by the evaluator and the
/// archival service so every state transition leaves exactly one audit
/// trail, regardless of which component drove it.
pub(crate) fn log_lifecycle_event(
    conn: &Connection,
    memory_id: &str,
    workspace_id: &str,
    previous_state: LifecycleState,
    new_state: LifecycleState,
    reason: &str,
    triggered_by: TriggeredBy,
    user_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO lifecycle_events (
            id, memory_id, workspace_id, previous_state, new_state, reason,
            triggered_by, user_id, metadata, created_at
         ) VALUES (?,?,?,?,?,?,?,?,?,?)",
        params![
            ids::random_id(),
            memory_id,
            workspace_id,
            previous_state.as_str(),
            new_state.as_str(),
            reason,
            triggered_by.as_str(),
            user_id,
            "{}",
            now.to_rfc3339(),
        ],
    )?;
    Ok(())
}
