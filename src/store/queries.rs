//! SQL row mapping and CRUD helpers for the entities in spec §3. Kept
//! separate from `mod.rs` so the memory/relationship business logic isn't
//! buried under row-mapping boilerplate, mirroring the teacher's
//! `storage::queries` vs `storage::connection` split.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row as SqlRow};
use std::collections::HashMap;

use crate::error::{MemoryError, Result};
use crate::ids;
use crate::types::{
    ArchivedMemory, Conversation, LifecycleState, Memory, Message, MessageRole, User, Workspace,
    WorkspaceType,
};

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_metadata(s: &str) -> HashMap<String, serde_json::Value> {
    serde_json::from_str(s).unwrap_or_default()
}

pub(crate) fn memory_from_row(row: &SqlRow) -> rusqlite::Result<Memory> {
    let metadata_str: String = row.get("metadata")?;
    let lifecycle_state_str: String = row.get("lifecycle_state")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let last_accessed_at: Option<String> = row.get("last_accessed_at")?;
    let pinned_at: Option<String> = row.get("pinned_at")?;
    let archived_at: Option<String> = row.get("archived_at")?;
    let expires_at: Option<String> = row.get("expires_at")?;
    let pinned_int: i64 = row.get("pinned")?;

    Ok(Memory {
        id: row.get("id")?,
        workspace_id: row.get("workspace_id")?,
        conversation_id: row.get("conversation_id")?,
        memory_type: row.get("memory_type")?,
        content: row.get("content")?,
        confidence: row.get("confidence")?,
        metadata: parse_metadata(&metadata_str),
        created_at: parse_rfc3339(&created_at),
        updated_at: parse_rfc3339(&updated_at),
        lifecycle_state: lifecycle_state_str.parse().unwrap_or(LifecycleState::Active),
        last_accessed_at: last_accessed_at.map(|s| parse_rfc3339(&s)),
        access_count: row.get("access_count")?,
        importance_score: row.get("importance_score")?,
        decay_score: row.get("decay_score")?,
        effective_ttl_ms: row.get("effective_ttl_ms")?,
        pinned: pinned_int != 0,
        pinned_by: row.get("pinned_by")?,
        pinned_at: pinned_at.map(|s| parse_rfc3339(&s)),
        archived_at: archived_at.map(|s| parse_rfc3339(&s)),
        expires_at: expires_at.map(|s| parse_rfc3339(&s)),
    })
}

pub(crate) fn insert_memory(conn: &Connection, m: &Memory) -> Result<()> {
    let metadata_json = serde_json::to_string(&m.metadata)?;
    conn.execute(
        "INSERT INTO memories (
            id, workspace_id, conversation_id, memory_type, content, confidence, metadata,
            created_at, updated_at, lifecycle_state, last_accessed_at, access_count,
            importance_score, decay_score, effective_ttl_ms, pinned, pinned_by, pinned_at,
            archived_at, expires_at
        ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)
        ON CONFLICT(id) DO UPDATE SET
            content = excluded.content,
            confidence = excluded.confidence,
            metadata = excluded.metadata,
            updated_at = excluded.updated_at",
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
            m.lifecycle_state.as_str(),
            m.last_accessed_at.map(|t| t.to_rfc3339()),
            m.access_count,
            m.importance_score,
            m.decay_score,
            m.effective_ttl_ms,
            m.pinned as i64,
            m.pinned_by,
            m.pinned_at.map(|t| t.to_rfc3339()),
            m.archived_at.map(|t| t.to_rfc3339()),
            m.expires_at.map(|t| t.to_rfc3339()),
        ],
    )
    .map_err(crate::relational::classify_sqlite_error)?;
    Ok(())
}

pub(crate) fn get_memory_row(
    conn: &Connection,
    id: &str,
    workspace_id: &str,
) -> Result<Option<Memory>> {
    conn.query_row(
        "SELECT * FROM memories WHERE id = ? AND workspace_id = ?",
        params![id, workspace_id],
        memory_from_row,
    )
    .optional()
    .map_err(Into::into)
}

pub(crate) fn archived_memory_from_row(row: &SqlRow) -> rusqlite::Result<ArchivedMemory> {
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
        metadata: parse_metadata(&metadata_str),
        created_at: parse_rfc3339(&created_at),
        updated_at: parse_rfc3339(&updated_at),
        importance_score: row.get("importance_score")?,
        decay_score: row.get("decay_score")?,
        access_count: row.get("access_count")?,
        last_accessed_at: last_accessed_at.map(|s| parse_rfc3339(&s)),
        archived_at: parse_rfc3339(&archived_at),
    })
}

/// Substring search over `archived_memories`, the archived-table
/// counterpart of the `text` branch of `search_memories` (spec §4.2:
/// "If `include_archived`, UNION with the archived table").
pub(crate) fn search_archived_by_text(
    conn: &Connection,
    workspace_id: &str,
    pattern: &str,
    limit: i64,
) -> Result<Vec<Memory>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM archived_memories WHERE workspace_id = ? AND content LIKE ?
         ORDER BY created_at DESC LIMIT ?",
    )?;
    let rows = stmt
        .query_map(params![workspace_id, pattern, limit], archived_memory_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().map(Memory::from).collect())
}

/// Filtered fetch over `archived_memories` by optional type set and
/// creation-date range, the archived-table counterpart of the vector
/// branch's relational fetch. Archived memories carry no vector-index
/// entry (deleted on archival, spec §4.6.6), so they cannot be ranked by
/// similarity; they are appended to the vector branch's results with a
/// nominal zero score rather than invented similarity.
pub(crate) fn list_archived_by_filters(
    conn: &Connection,
    workspace_id: &str,
    types: Option<&[String]>,
    date_from: Option<chrono::DateTime<Utc>>,
    date_to: Option<chrono::DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<Memory>> {
    let mut sql = String::from("SELECT * FROM archived_memories WHERE workspace_id = ?");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(workspace_id.to_string())];

    if let Some(types) = types {
        if !types.is_empty() {
            let placeholders = types.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            sql.push_str(&format!(" AND memory_type IN ({placeholders})"));
            for t in types {
                params.push(Box::new(t.clone()));
            }
        }
    }
    if let Some(from) = date_from {
        sql.push_str(" AND created_at >= ?");
        params.push(Box::new(from.to_rfc3339()));
    }
    if let Some(to) = date_to {
        sql.push_str(" AND created_at <= ?");
        params.push(Box::new(to.to_rfc3339()));
    }
    sql.push_str(" ORDER BY created_at DESC LIMIT ?");
    params.push(Box::new(limit));

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), archived_memory_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().map(Memory::from).collect())
}

pub(crate) fn workspace_exists(conn: &Connection, workspace_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM workspaces WHERE id = ?",
        params![workspace_id],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

pub(crate) fn conversation_in_workspace(
    conn: &Connection,
    conversation_id: &str,
    workspace_id: &str,
) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM conversations WHERE id = ? AND workspace_id = ?",
        params![conversation_id, workspace_id],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

pub fn create_user(conn: &Connection, email: &str, name: Option<&str>) -> Result<User> {
    let now = Utc::now();
    let id = ids::random_id();
    conn.execute(
        "INSERT INTO users (id, email, name, created_at, updated_at) VALUES (?,?,?,?,?)",
        params![id, email, name, now.to_rfc3339(), now.to_rfc3339()],
    )
    .map_err(crate::relational::classify_sqlite_error)?;
    Ok(User {
        id,
        email: email.to_string(),
        name: name.map(String::from),
        created_at: now,
        updated_at: now,
    })
}

pub fn create_workspace(
    conn: &Connection,
    name: &str,
    workspace_type: WorkspaceType,
    owner_id: &str,
) -> Result<Workspace> {
    let now = Utc::now();
    let id = ids::random_id();
    conn.execute(
        "INSERT INTO workspaces (id, name, workspace_type, owner_id, created_at, updated_at)
         VALUES (?,?,?,?,?,?)",
        params![
            id,
            name,
            workspace_type.as_str(),
            owner_id,
            now.to_rfc3339(),
            now.to_rfc3339()
        ],
    )
    .map_err(crate::relational::classify_sqlite_error)?;
    Ok(Workspace {
        id,
        name: name.to_string(),
        workspace_type,
        owner_id: owner_id.to_string(),
        created_at: now,
        updated_at: now,
    })
}

pub fn create_conversation(
    conn: &Connection,
    workspace_id: &str,
    provider: &str,
    external_id: Option<&str>,
    title: Option<&str>,
) -> Result<Conversation> {
    if !workspace_exists(conn, workspace_id)? {
        return Err(MemoryError::not_found("workspace", workspace_id));
    }
    let now = Utc::now();
    let id = ids::random_id();
    conn.execute(
        "INSERT INTO conversations (id, workspace_id, provider, external_id, title, created_at, updated_at)
         VALUES (?,?,?,?,?,?,?)",
        params![id, workspace_id, provider, external_id, title, now.to_rfc3339(), now.to_rfc3339()],
    )?;
    Ok(Conversation {
        id,
        workspace_id: workspace_id.to_string(),
        provider: provider.to_string(),
        external_id: external_id.map(String::from),
        title: title.map(String::from),
        created_at: now,
        updated_at: now,
    })
}

pub fn create_message(
    conn: &Connection,
    conversation_id: &str,
    role: MessageRole,
    content: &str,
) -> Result<Message> {
    let now = Utc::now();
    let id = ids::random_id();
    conn.execute(
        "INSERT INTO messages (id, conversation_id, role, content, created_at) VALUES (?,?,?,?,?)",
        params![id, conversation_id, role.as_str(), content, now.to_rfc3339()],
    )?;
    Ok(Message {
        id,
        conversation_id: conversation_id.to_string(),
        role,
        content: content.to_string(),
        created_at: now,
    })
}

pub fn list_messages(conn: &Connection, conversation_id: &str) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, role, content, created_at FROM messages
         WHERE conversation_id = ? ORDER BY created_at ASC",
    )?;
    let rows = stmt
        .query_map(params![conversation_id], |row| {
            let role_str: String = row.get("role")?;
            let created_at: String = row.get("created_at")?;
            Ok(Message {
                id: row.get("id")?,
                conversation_id: row.get("conversation_id")?,
                role: role_str.parse().unwrap_or(MessageRole::User),
                content: row.get("content")?,
                created_at: parse_rfc3339(&created_at),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
