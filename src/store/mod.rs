//! The Memory Store (spec §4.2): the user-facing storage API. Enforces
//! workspace scoping on every read and the relational/vector compensating
//! action contract (spec §4.2, §5).

pub mod queries;

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{instrument, warn};

use crate::config::StoreConfig;
use crate::error::{MemoryError, Result};
use crate::ids;
use crate::relational::SqliteStore;
use crate::types::{ListOptions, ListOrder, Memory, Relationship, SearchOptions};
use crate::vector::{Filter, VectorAdapter};

/// Input for `create_memory` (spec §4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateMemoryInput {
    pub workspace_id: String,
    pub conversation_id: Option<String>,
    pub memory_type: String,
    pub content: String,
    pub confidence: f32,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub embedding: Option<Vec<f32>>,
    /// Caller-supplied id (from the extraction layer's deterministic hash).
    /// If absent, the store computes one the same way via `crate::ids`.
    pub id: Option<String>,
}

struct AccessEvent {
    memory_id: String,
    workspace_id: String,
}

/// The public storage API: users, workspaces, conversations, messages,
/// memories, relationships, search.
pub struct MemoryStore {
    relational: SqliteStore,
    vector: Arc<dyn VectorAdapter>,
    config: StoreConfig,
    access_tx: mpsc::Sender<AccessEvent>,
}

impl MemoryStore {
    /// Build a store over `relational`/`vector` and spawn the fire-and-forget
    /// access-tracking worker (spec §5, §9). Must be called from within a
    /// running Tokio runtime, the same constraint the teacher's
    /// `sync::worker::SyncWorker` carries for its background task.
    pub fn new(relational: SqliteStore, vector: Arc<dyn VectorAdapter>, config: StoreConfig) -> Self {
        let (access_tx, mut access_rx) = mpsc::channel::<AccessEvent>(config.access_tracking_queue_size);

        let worker_relational = relational.clone();
        tokio::spawn(async move {
            while let Some(event) = access_rx.recv().await {
                let result = worker_relational.with_connection(|conn| {
                    conn.execute(
                        "UPDATE memories SET access_count = access_count + 1, last_accessed_at = ?
                         WHERE id = ? AND workspace_id = ?",
                        params![Utc::now().to_rfc3339(), event.memory_id, event.workspace_id],
                    )?;
                    Ok(())
                });
                if let Err(e) = result {
                    warn!(memory_id = %event.memory_id, error = %e, "access tracking update failed");
                }
            }
        });

        Self {
            relational,
            vector,
            config,
            access_tx,
        }
    }

    /// Create a memory. Preconditions and lifecycle initialization per spec
    /// §4.2. If an embedding is supplied and the vector upsert fails after
    /// the relational insert succeeds, the relational row is deleted
    /// (compensating action) and the vector error is surfaced.
    #[instrument(skip(self, input), fields(workspace_id = %input.workspace_id))]
    pub async fn create_memory(&self, input: CreateMemoryInput) -> Result<Memory> {
        if input.memory_type.trim().is_empty() {
            return Err(MemoryError::validation("type", "memory type must not be empty"));
        }
        if input.content.trim().is_empty() {
            return Err(MemoryError::validation("content", "content must not be empty"));
        }
        if !(0.0..=1.0).contains(&input.confidence) {
            return Err(MemoryError::validation("confidence", "confidence must be in [0,1]"));
        }

        let workspace_id = input.workspace_id.clone();
        let conversation_id = input.conversation_id.clone();
        self.relational.with_connection(|conn| {
            if !queries::workspace_exists(conn, &workspace_id)? {
                return Err(MemoryError::not_found("workspace", workspace_id.clone()));
            }
            if let Some(ref cid) = conversation_id {
                if !queries::conversation_in_workspace(conn, cid, &workspace_id)? {
                    return Err(MemoryError::validation(
                        "conversation_id",
                        "conversation does not belong to workspace",
                    ));
                }
            }
            Ok(())
        })?;

        let id = input
            .id
            .clone()
            .unwrap_or_else(|| ids::memory_id(&input.memory_type, &input.content, &input.workspace_id));
        let now = Utc::now();

        let memory = Memory {
            id,
            workspace_id: input.workspace_id.clone(),
            conversation_id: input.conversation_id.clone(),
            memory_type: input.memory_type.clone(),
            content: input.content.clone(),
            confidence: input.confidence,
            metadata: input.metadata.clone(),
            created_at: now,
            updated_at: now,
            lifecycle_state: crate::types::LifecycleState::Active,
            last_accessed_at: Some(now),
            access_count: 0,
            importance_score: 0.5,
            decay_score: 1.0,
            effective_ttl_ms: None,
            pinned: false,
            pinned_by: None,
            pinned_at: None,
            archived_at: None,
            expires_at: None,
        };

        self.relational
            .with_connection(|conn| queries::insert_memory(conn, &memory))?;

        if let Some(vector) = input.embedding {
            let metadata = serde_json::json!({
                "workspace_id": memory.workspace_id,
                "type": memory.memory_type,
                "created_at": memory.created_at.timestamp_millis(),
            });
            if let Err(vector_err) = self.vector.upsert(&memory.id, vector, metadata).await {
                let memory_id = memory.id.clone();
                let _ = self.relational.with_connection(|conn| {
                    conn.execute("DELETE FROM memories WHERE id = ?", params![memory_id])?;
                    Ok(())
                });
                return Err(vector_err);
            }
        }

        Ok(memory)
    }

    /// Fetch a memory scoped to `workspace_id`. On a hit, schedules a
    /// fire-and-forget access-count update; this never blocks the read and
    /// never fails it (spec §4.2, §5).
    #[instrument(skip(self))]
    pub async fn get_memory(&self, id: &str, workspace_id: &str) -> Result<Option<Memory>> {
        let memory = self
            .relational
            .with_connection(|conn| queries::get_memory_row(conn, id, workspace_id))?;

        if memory.is_some() {
            let event = AccessEvent {
                memory_id: id.to_string(),
                workspace_id: workspace_id.to_string(),
            };
            if let Err(e) = self.access_tx.try_send(event) {
                warn!(memory_id = %id, error = %e, "access tracking queue full, dropping update");
            }
        }

        Ok(memory)
    }

    /// List memories in a workspace (spec §4.2: type set, ordering,
    /// limit in [1,1000], offset >= 0).
    #[instrument(skip(self, options))]
    pub fn list_memories(&self, workspace_id: &str, options: &ListOptions) -> Result<Vec<Memory>> {
        let limit = options.limit.unwrap_or(100).clamp(1, 1000);
        let offset = options.offset.unwrap_or(0).max(0);
        let order = match options.order {
            ListOrder::Asc => "ASC",
            ListOrder::Desc => "DESC",
        };

        self.relational.with_connection(|conn| {
            let mut sql = String::from("SELECT * FROM memories WHERE workspace_id = ?");
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(workspace_id.to_string())];

            if let Some(types) = &options.types {
                if !types.is_empty() {
                    let placeholders = types.iter().map(|_| "?").collect::<Vec<_>>().join(",");
                    sql.push_str(&format!(" AND memory_type IN ({})", placeholders));
                    for t in types {
                        params_vec.push(Box::new(t.clone()));
                    }
                }
            }

            sql.push_str(&format!(" ORDER BY created_at {} LIMIT ? OFFSET ?", order));
            params_vec.push(Box::new(limit));
            params_vec.push(Box::new(offset));

            let params_ref: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_ref.as_slice(), queries::memory_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Delete a memory and its relationships. Best-effort vector delete;
    /// a vector failure is logged but does not fail the overall delete
    /// (spec §4.2).
    #[instrument(skip(self))]
    pub async fn delete_memory(&self, id: &str, workspace_id: &str) -> Result<()> {
        let existed = self.relational.with_connection(|conn| {
            let deleted = conn.execute(
                "DELETE FROM memories WHERE id = ? AND workspace_id = ?",
                params![id, workspace_id],
            )?;
            if deleted > 0 {
                conn.execute(
                    "DELETE FROM relationships WHERE from_memory_id = ? OR to_memory_id = ?",
                    params![id, id],
                )?;
            }
            Ok(deleted > 0)
        })?;

        if !existed {
            return Err(MemoryError::not_found("memory", id));
        }

        if let Err(e) = self.vector.delete(id).await {
            warn!(memory_id = %id, error = %e, "best-effort vector delete failed");
        }

        Ok(())
    }

    /// Search memories by vector and/or substring text, workspace-scoped
    /// (spec §4.2).
    #[instrument(skip(self, options))]
    pub async fn search_memories(
        &self,
        workspace_id: &str,
        options: &SearchOptions,
    ) -> Result<Vec<(Memory, f32)>> {
        let limit = if options.limit <= 0 { 10 } else { options.limit.min(100) };

        if let Some(vector) = &options.vector {
            let mut filter = Filter::new().eq("workspace_id", workspace_id);
            if let Some(types) = &options.types {
                filter = filter.in_set("type", types.iter().map(|t| t.clone().into()).collect());
            }
            if let Some(from) = options.date_from {
                filter = filter.gte("created_at", from.timestamp_millis());
            }
            if let Some(to) = options.date_to {
                filter = filter.lte("created_at", to.timestamp_millis());
            }

            let hits = self.vector.search(vector, limit as usize, &filter).await?;
            let mut results = Vec::with_capacity(hits.len());
            for hit in hits {
                if let Some(memory) = self
                    .relational
                    .with_connection(|conn| queries::get_memory_row(conn, &hit.id, workspace_id))?
                {
                    results.push((memory, hit.score));
                }
            }

            if options.include_archived {
                // Archived memories carry no vector-index entry (spec §4.6.6
                // deletes it on archival), so they cannot be ranked by
                // similarity; union them in with a nominal zero score rather
                // than inventing one.
                let archived = self.relational.with_connection(|conn| {
                    queries::list_archived_by_filters(
                        conn,
                        workspace_id,
                        options.types.as_deref(),
                        options.date_from,
                        options.date_to,
                        limit,
                    )
                })?;
                results.extend(archived.into_iter().map(|m| (m, 0.0)));
            }

            return Ok(results);
        }

        if let Some(text) = &options.text {
            let pattern = format!("%{}%", text);
            let rows = self.relational.with_connection(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT * FROM memories WHERE workspace_id = ? AND content LIKE ?
                     ORDER BY created_at DESC LIMIT ?",
                )?;
                let rows = stmt
                    .query_map(params![workspace_id, pattern, limit], queries::memory_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })?;
            let mut results: Vec<(Memory, f32)> = rows.into_iter().map(|m| (m, 1.0)).collect();

            if options.include_archived {
                let archived = self
                    .relational
                    .with_connection(|conn| queries::search_archived_by_text(conn, workspace_id, &pattern, limit))?;
                results.extend(archived.into_iter().map(|m| (m, 1.0)));
            }

            return Ok(results);
        }

        Ok(Vec::new())
    }

    /// Create a relationship. Both endpoints must exist (in either the
    /// active or archived memories table, per the soft-reference decision
    /// for relationship preservation across archival) and share a
    /// workspace; cross-workspace attempts are a validation error
    /// (spec §3, §4.2, invariant 8).
    #[instrument(skip(self))]
    pub async fn create_relationship(
        &self,
        from_memory_id: &str,
        to_memory_id: &str,
        relationship_type: &str,
        confidence: f32,
    ) -> Result<Relationship> {
        let (from_ws, to_ws) = self.relational.with_connection(|conn| {
            let from_ws = memory_workspace(conn, from_memory_id)?;
            let to_ws = memory_workspace(conn, to_memory_id)?;
            Ok((from_ws, to_ws))
        })?;

        let from_ws = from_ws.ok_or_else(|| MemoryError::not_found("memory", from_memory_id))?;
        let to_ws = to_ws.ok_or_else(|| MemoryError::not_found("memory", to_memory_id))?;

        if from_ws != to_ws {
            return Err(MemoryError::validation(
                "workspace_id",
                "relationship endpoints must share a workspace",
            ));
        }

        let now = Utc::now();
        let id = ids::random_id();
        self.relational.with_connection(|conn| {
            conn.execute(
                "INSERT INTO relationships (id, from_memory_id, to_memory_id, relationship_type, confidence, created_at)
                 VALUES (?,?,?,?,?,?)",
                params![id, from_memory_id, to_memory_id, relationship_type, confidence, now.to_rfc3339()],
            )?;
            Ok(())
        })?;

        Ok(Relationship {
            id,
            from_memory_id: from_memory_id.to_string(),
            to_memory_id: to_memory_id.to_string(),
            relationship_type: relationship_type.to_string(),
            confidence,
            created_at: now,
        })
    }

    /// Relationships touching `memory_id`, scoped to `workspace_id`.
    #[instrument(skip(self))]
    pub fn get_memory_relationships(
        &self,
        memory_id: &str,
        workspace_id: &str,
    ) -> Result<Vec<Relationship>> {
        self.relational.with_connection(|conn| {
            if memory_workspace(conn, memory_id)?.as_deref() != Some(workspace_id) {
                return Ok(Vec::new());
            }
            let mut stmt = conn.prepare(
                "SELECT id, from_memory_id, to_memory_id, relationship_type, confidence, created_at
                 FROM relationships WHERE from_memory_id = ? OR to_memory_id = ?",
            )?;
            let rows = stmt
                .query_map(params![memory_id, memory_id], |row| {
                    let created_at: String = row.get("created_at")?;
                    Ok(Relationship {
                        id: row.get("id")?,
                        from_memory_id: row.get("from_memory_id")?,
                        to_memory_id: row.get("to_memory_id")?,
                        relationship_type: row.get("relationship_type")?,
                        confidence: row.get("confidence")?,
                        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                            .map(|dt| dt.with_timezone(&Utc))
                            .unwrap_or_else(|_| Utc::now()),
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn relational(&self) -> &SqliteStore {
        &self.relational
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

/// Look up a memory's workspace, checking the active table then the
/// archived table (soft-reference: relationships may point at archived
/// memories).
fn memory_workspace(conn: &rusqlite::Connection, memory_id: &str) -> Result<Option<String>> {
    let active: Option<String> = conn
        .query_row(
            "SELECT workspace_id FROM memories WHERE id = ?",
            params![memory_id],
            |r| r.get(0),
        )
        .optional()?;
    if active.is_some() {
        return Ok(active);
    }
    let archived: Option<String> = conn
        .query_row(
            "SELECT workspace_id FROM archived_memories WHERE id = ?",
            params![memory_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(archived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::LocalVectorIndex;

    async fn test_store() -> (MemoryStore, String) {
        let relational = SqliteStore::open_in_memory().unwrap();
        let workspace_id = relational
            .with_connection(|conn| {
                let user = queries::create_user(conn, "a@example.com", None)?;
                let ws = queries::create_workspace(
                    conn,
                    "ws",
                    crate::types::WorkspaceType::Personal,
                    &user.id,
                )?;
                Ok(ws.id)
            })
            .unwrap();
        let store = MemoryStore::new(
            relational,
            Arc::new(LocalVectorIndex::new()),
            StoreConfig::default(),
        );
        (store, workspace_id)
    }

    #[tokio::test]
    async fn create_then_get_memory_round_trips() {
        let (store, workspace_id) = test_store().await;
        let created = store
            .create_memory(CreateMemoryInput {
                workspace_id: workspace_id.clone(),
                memory_type: "fact".into(),
                content: "Kubernetes is an orchestration platform".into(),
                confidence: 0.9,
                ..Default::default()
            })
            .await
            .unwrap();

        let fetched = store.get_memory(&created.id, &workspace_id).await.unwrap();
        assert!(fetched.is_some());
        assert_eq!(fetched.unwrap().content, created.content);
    }

    #[tokio::test]
    async fn get_memory_in_wrong_workspace_is_none() {
        let (store, workspace_id) = test_store().await;
        let created = store
            .create_memory(CreateMemoryInput {
                workspace_id: workspace_id.clone(),
                memory_type: "fact".into(),
                content: "scoped fact".into(),
                confidence: 0.8,
                ..Default::default()
            })
            .await
            .unwrap();

        let fetched = store.get_memory(&created.id, "some-other-workspace").await.unwrap();
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn create_memory_rejects_unknown_workspace() {
        let (store, _workspace_id) = test_store().await;
        let result = store
            .create_memory(CreateMemoryInput {
                workspace_id: "nonexistent".into(),
                memory_type: "fact".into(),
                content: "x".into(),
                confidence: 0.5,
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(MemoryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn create_memory_rejects_out_of_range_confidence() {
        let (store, workspace_id) = test_store().await;
        let result = store
            .create_memory(CreateMemoryInput {
                workspace_id,
                memory_type: "fact".into(),
                content: "x".into(),
                confidence: 1.5,
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(MemoryError::Validation { .. })));
    }

    #[tokio::test]
    async fn create_memory_with_embedding_is_searchable() {
        let (store, workspace_id) = test_store().await;
        store
            .create_memory(CreateMemoryInput {
                workspace_id: workspace_id.clone(),
                memory_type: "fact".into(),
                content: "Kubernetes is an orchestration platform".into(),
                confidence: 0.9,
                embedding: Some(vec![1.0, 0.0, 0.0]),
                ..Default::default()
            })
            .await
            .unwrap();

        let results = store
            .search_memories(
                &workspace_id,
                &SearchOptions {
                    vector: Some(vec![1.0, 0.0, 0.0]),
                    limit: 5,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].1 > 0.0);
    }

    #[tokio::test]
    async fn text_search_excludes_archived_unless_requested() {
        let (store, workspace_id) = test_store().await;
        let memory = store
            .create_memory(CreateMemoryInput {
                workspace_id: workspace_id.clone(),
                memory_type: "fact".into(),
                content: "hibernating bears den".into(),
                confidence: 0.8,
                ..Default::default()
            })
            .await
            .unwrap();

        crate::lifecycle::archival::archive_memory(
            store.relational(),
            store.vector.as_ref(),
            &memory.id,
            &workspace_id,
            "test archival",
            crate::types::TriggeredBy::System,
            chrono::Utc::now(),
        )
        .await
        .unwrap();

        let without_archived = store
            .search_memories(
                &workspace_id,
                &SearchOptions {
                    text: Some("hibernating".into()),
                    limit: 5,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(without_archived.is_empty());

        let with_archived = store
            .search_memories(
                &workspace_id,
                &SearchOptions {
                    text: Some("hibernating".into()),
                    limit: 5,
                    include_archived: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(with_archived.len(), 1);
        assert_eq!(with_archived[0].0.id, memory.id);
        assert_eq!(with_archived[0].0.lifecycle_state, crate::types::LifecycleState::Archived);
    }

    #[tokio::test]
    async fn vector_search_unions_archived_with_nominal_score() {
        let (store, workspace_id) = test_store().await;
        let memory = store
            .create_memory(CreateMemoryInput {
                workspace_id: workspace_id.clone(),
                memory_type: "fact".into(),
                content: "archived vector fact".into(),
                confidence: 0.8,
                embedding: Some(vec![1.0, 0.0, 0.0]),
                ..Default::default()
            })
            .await
            .unwrap();

        crate::lifecycle::archival::archive_memory(
            store.relational(),
            store.vector.as_ref(),
            &memory.id,
            &workspace_id,
            "test archival",
            crate::types::TriggeredBy::System,
            chrono::Utc::now(),
        )
        .await
        .unwrap();

        let results = store
            .search_memories(
                &workspace_id,
                &SearchOptions {
                    vector: Some(vec![1.0, 0.0, 0.0]),
                    limit: 5,
                    include_archived: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.id, memory.id);
        assert_eq!(results[0].1, 0.0);
    }

    #[tokio::test]
    async fn cross_workspace_relationship_is_rejected() {
        let (store, workspace_id) = test_store().await;
        let m1 = store
            .create_memory(CreateMemoryInput {
                workspace_id: workspace_id.clone(),
                memory_type: "fact".into(),
                content: "m1".into(),
                confidence: 0.9,
                ..Default::default()
            })
            .await
            .unwrap();

        let other_ws = store
            .relational
            .with_connection(|conn| {
                let user = queries::create_user(conn, "b@example.com", None)?;
                queries::create_workspace(conn, "ws2", crate::types::WorkspaceType::Personal, &user.id)
            })
            .unwrap()
            .id;
        let m2 = store
            .create_memory(CreateMemoryInput {
                workspace_id: other_ws,
                memory_type: "fact".into(),
                content: "m2".into(),
                confidence: 0.9,
                ..Default::default()
            })
            .await
            .unwrap();

        let result = store
            .create_relationship(&m1.id, &m2.id, "related_to", 1.0)
            .await;
        assert!(matches!(result, Err(MemoryError::Validation { .. })));
    }

    #[tokio::test]
    async fn delete_memory_cascades_relationships() {
        let (store, workspace_id) = test_store().await;
        let m1 = store
            .create_memory(CreateMemoryInput {
                workspace_id: workspace_id.clone(),
                memory_type: "fact".into(),
                content: "m1".into(),
                confidence: 0.9,
                ..Default::default()
            })
            .await
            .unwrap();
        let m2 = store
            .create_memory(CreateMemoryInput {
                workspace_id: workspace_id.clone(),
                memory_type: "fact".into(),
                content: "m2".into(),
                confidence: 0.9,
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .create_relationship(&m1.id, &m2.id, "related_to", 1.0)
            .await
            .unwrap();

        store.delete_memory(&m1.id, &workspace_id).await.unwrap();
        let rels = store.get_memory_relationships(&m2.id, &workspace_id).unwrap();
        assert!(rels.is_empty());
    }
}
