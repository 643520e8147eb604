//! Archival and restore (spec §4.6.6): moving a memory between the active
//! and archived tables. Unlike the evaluator, this is async because it has
//! to coordinate the vector store, mirroring the compensating-action style
//! already used by `MemoryStore::delete_memory`.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use super::log_lifecycle_event;
use super::state_machine::validate_transition;
use crate::error::{MemoryError, Result};
use crate::relational::SqliteStore;
use crate::store::queries;
use crate::types::{ArchivedMemory, LifecycleState, Memory, TriggeredBy};
use crate::vector::VectorAdapter;

/// Move `memory_id` from `memories` into `archived_memories`. Steps: read
/// the active row, best-effort delete its vector entry (warned, not
/// fatal), then atomically insert the archived row, delete the active row,
/// and append the lifecycle event. If the relational half fails partway,
/// `SqliteStore::with_transaction` rolls the whole thing back; the memory
/// is left active rather than archived-but-not-deleted.
pub async fn archive_memory(
    relational: &SqliteStore,
    vector: &dyn VectorAdapter,
    memory_id: &str,
    workspace_id: &str,
    reason: &str,
    triggered_by: TriggeredBy,
    now: DateTime<Utc>,
) -> Result<()> {
    let memory = relational
        .with_connection(|conn| queries::get_memory_row(conn, memory_id, workspace_id))?
        .ok_or_else(|| MemoryError::not_found("memory", memory_id))?;

    let decision = validate_transition(memory.lifecycle_state, LifecycleState::Archived, triggered_by);
    if !decision.valid {
        return Err(MemoryError::Conflict(format!(
            "cannot archive memory {memory_id} from {}: {}",
            memory.lifecycle_state, decision.reason
        )));
    }

    if let Err(e) = vector.delete(memory_id).await {
        warn!(memory_id, error = %e, "best-effort vector delete failed during archival");
    }

    let previous_state = memory.lifecycle_state;
    let archived: ArchivedMemory = memory.into();

    relational.with_transaction(|tx| {
        insert_archived_row(tx, &archived)?;
        tx.execute("DELETE FROM memories WHERE id = ?", params![memory_id])?;
        log_lifecycle_event(
            tx,
            memory_id,
            workspace_id,
            previous_state,
            LifecycleState::Archived,
            reason,
            triggered_by,
            None,
            now,
        )
    })
}

/// Move `memory_id` back from `archived_memories` into `memories`. Per
/// spec §9's design note, there is no "shadow state" to restore: decay
/// score resets to full freshness and access_count ticks up once, as if
/// this were a normal access, rather than replaying whatever decay would
/// have accrued while archived.
pub async fn restore_memory(
    relational: &SqliteStore,
    workspace_id: &str,
    memory_id: &str,
    triggered_by: TriggeredBy,
    now: DateTime<Utc>,
) -> Result<Memory> {
    relational.with_transaction(|tx| {
        let archived = get_archived_row(tx, memory_id, workspace_id)?
            .ok_or_else(|| MemoryError::not_found("memory", memory_id))?;

        let decision = validate_transition(LifecycleState::Archived, LifecycleState::Active, triggered_by);
        if !decision.valid {
            return Err(MemoryError::Conflict(format!(
                "cannot restore memory {memory_id}: {}",
                decision.reason
            )));
        }

        let restored = Memory {
            id: archived.id,
            workspace_id: archived.workspace_id,
            conversation_id: archived.conversation_id,
            memory_type: archived.memory_type,
            content: archived.content,
            confidence: archived.confidence,
            metadata: archived.metadata,
            created_at: archived.created_at,
            updated_at: now,
            lifecycle_state: LifecycleState::Active,
            last_accessed_at: Some(now),
            access_count: archived.access_count + 1,
            importance_score: archived.importance_score,
            decay_score: 1.0,
            effective_ttl_ms: None,
            pinned: false,
            pinned_by: None,
            pinned_at: None,
            archived_at: None,
            expires_at: None,
        };

        queries::insert_memory(tx, &restored)?;
        tx.execute("DELETE FROM archived_memories WHERE id = ?", params![memory_id])?;
        log_lifecycle_event(
            tx,
            memory_id,
            workspace_id,
            LifecycleState::Archived,
            LifecycleState::Active,
            "restored from archive",
            triggered_by,
            None,
            now,
        )?;
        Ok(restored)
    })
}

fn insert_archived_row(conn: &Connection, m: &ArchivedMemory) -> Result<()> {
    let metadata_json = serde_json::to_string(&m.metadata)?;
    conn.execute(
        "INSERT INTO archived_memories (
            id, workspace_id, conversation_id, memory_type, content, confidence, metadata,
            created_at, updated_at, importance_score, decay_score, access_count,
            last_accessed_at, archived_at
        ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?)",
        params![
            m.id,
            m.workspace_id,
            m.conversation_id,
            m.memory_type,
            m.content,
            m.confidence,
            metadata_json,
            m.created_at.to_rfc3339(),
            m.updated_at.to_rfc3339(),
            m.importance_score,
            m.decay_score,
            m.access_count,
            m.last_accessed_at.map(|t| t.to_rfc3339()),
            m.archived_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn get_archived_row(conn: &Connection, id: &str, workspace_id: &str) -> Result<Option<ArchivedMemory>> {
    conn.query_row(
        "SELECT * FROM archived_memories WHERE id = ? AND workspace_id = ?",
        params![id, workspace_id],
        archived_memory_from_row,
    )
    .optional()
    .map_err(Into::into)
}

fn archived_memory_from_row(row: &rusqlite::Row) -> rusqlite::Result<ArchivedMemory> {
    let metadata_str: String = row.get("metadata")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let last_accessed_at: Option<String> = row.get("last_accessed_at")?;
    let archived_at: String = row.get("archived_at")?;

    Ok(ArchivedMemory {
        id: row.get("id")?,
        workspace_id: row.get("workspace_id")?,
        conversation_id: row.get("conversation_id")?,
        memory_type: row.get("memory_type")?,
        content: row.get("content")?,
        confidence: row.get("confidence")?,
        metadata: serde_json::from_str(&metadata_str).unwrap_or_default(),
        created_at: parse_rfc3339(&created_at),
        updated_at: parse_rfc3339(&updated_at),
        importance_score: row.get("importance_score")?,
        decay_score: row.get("decay_score")?,
        access_count: row.get("access_count")?,
        last_accessed_at: last_accessed_at.map(|s| parse_rfc3339(&s)),
        archived_at: parse_rfc3339(&archived_at),
    })
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
