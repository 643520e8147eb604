//! Property tests for the invariants in the system specification's testable
//! properties section that require a full `MemoryStore` (workspace
//! isolation, dedup stability, archive/restore round-trip, idempotent
//! evaluation, cleanup safety). Invariants that are pure functions over a
//! single module (decay bounds/monotonicity/determinism, importance
//! monotonicity, TTL extension, state-machine validity, cosine similarity)
//! are covered by `proptest!` blocks alongside those modules instead.

use std::sync::Arc;

use chrono::{Duration, Utc};
use memoryd::config::{LifecycleConfig, StoreConfig};
use memoryd::error::MemoryError;
use memoryd::ids;
use memoryd::lifecycle::evaluator::tick;
use memoryd::lifecycle::retention::RetentionPolicies;
use memoryd::relational::SqliteStore;
use memoryd::store::{queries, CreateMemoryInput, MemoryStore};
use memoryd::types::WorkspaceType;
use memoryd::vector::LocalVectorIndex;
use proptest::prelude::*;

fn new_store() -> (tokio::runtime::Runtime, MemoryStore, String) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let relational = SqliteStore::open_in_memory().unwrap();
    let workspace_id = relational
        .with_connection(|conn| {
            let user = queries::create_user(conn, "prop@example.com", None)?;
            let ws = queries::create_workspace(conn, "prop-ws", WorkspaceType::Personal, &user.id)?;
            Ok(ws.id)
        })
        .unwrap();
    let store = MemoryStore::new(relational, Arc::new(LocalVectorIndex::new()), StoreConfig::default());
    (rt, store, workspace_id)
}

proptest! {
    /// Invariant 9 (dedup stability): the memory id is a pure function of
    /// `(type, normalized_content, workspace_id)` regardless of surface
    /// whitespace/case differences in the content, so re-extracting the
    /// same conversation content yields the same id.
    #[test]
    fn dedup_stability_ignores_whitespace_and_case(
        memory_type in "[a-z]{3,10}",
        word_a in "[a-zA-Z]{3,8}",
        word_b in "[a-zA-Z]{3,8}",
        workspace_id in "[a-z0-9-]{5,20}",
    ) {
        let content_a = format!("{}   {}", word_a, word_b);
        let content_b = format!("{}  {}", word_a.to_uppercase(), word_b.to_lowercase());

        let id_a = ids::memory_id(&memory_type, &content_a, &workspace_id);
        let id_b = ids::memory_id(&memory_type, &content_b, &workspace_id);
        prop_assert_eq!(id_a, id_b);
    }

    /// Invariant 9, continued: changing the workspace changes the id even
    /// for identical type/content, since ids are scoped per workspace.
    #[test]
    fn dedup_stability_is_workspace_scoped(
        memory_type in "[a-z]{3,10}",
        content in "[a-zA-Z ]{5,30}",
        ws_a in "[a-z0-9-]{5,20}",
        ws_b in "[a-z0-9-]{5,20}",
    ) {
        prop_assume!(ws_a != ws_b);
        let id_a = ids::memory_id(&memory_type, &content, &ws_a);
        let id_b = ids::memory_id(&memory_type, &content, &ws_b);
        prop_assert_ne!(id_a, id_b);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Invariant 8 (workspace isolation): a memory created in one workspace
    /// is never visible through another workspace's id, and a relationship
    /// across two workspaces is always rejected without writing a row.
    #[test]
    fn workspace_isolation_holds_across_random_content(content in "[a-zA-Z0-9 ]{5,60}", confidence in 0.0f32..1.0f32) {
        let (rt, store, ws_a) = new_store();
        let ws_b = store
            .relational()
            .with_connection(|conn| {
                let user = queries::create_user(conn, "other-prop@example.com", None)?;
                queries::create_workspace(conn, "other-prop-ws", WorkspaceType::Personal, &user.id)
            })
            .unwrap()
            .id;

        let created = rt.block_on(store.create_memory(CreateMemoryInput {
            workspace_id: ws_a.clone(),
            memory_type: "fact".to_string(),
            content,
            confidence,
            ..Default::default()
        })).unwrap();

        let seen_from_other_workspace = rt.block_on(store.get_memory(&created.id, &ws_b)).unwrap();
        prop_assert!(seen_from_other_workspace.is_none());

        let other = rt.block_on(store.create_memory(CreateMemoryInput {
            workspace_id: ws_b.clone(),
            memory_type: "fact".to_string(),
            content: "cross-workspace target".to_string(),
            confidence: 0.5,
            ..Default::default()
        })).unwrap();

        let result = rt.block_on(store.create_relationship(&created.id, &other.id, "related_to", 0.5));
        prop_assert!(matches!(result, Err(MemoryError::Validation { field, .. }) if field == "workspace_id"));

        let rels = store.get_memory_relationships(&created.id, &ws_a).unwrap();
        prop_assert!(rels.is_empty());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Invariant 10 (round-trip): archive then restore preserves content,
    /// type, confidence, and workspace id; resets decay_score to 1.0 and
    /// increments access_count.
    #[test]
    fn archive_restore_round_trip_preserves_identity(
        content in "[a-zA-Z0-9 ]{5,60}",
        memory_type in prop_oneof!["fact".to_string(), "entity".to_string(), "todo".to_string()],
        confidence in 0.0f32..1.0f32,
    ) {
        let (rt, store, workspace_id) = new_store();
        let created = rt.block_on(store.create_memory(CreateMemoryInput {
            workspace_id: workspace_id.clone(),
            memory_type: memory_type.clone(),
            content: content.clone(),
            confidence,
            ..Default::default()
        })).unwrap();

        let now = Utc::now();
        rt.block_on(memoryd::lifecycle::archival::archive_memory(
            store.relational(),
            &LocalVectorIndex::new(),
            &created.id,
            &workspace_id,
            "property test archive",
            memoryd::types::TriggeredBy::User,
            now,
        )).unwrap();

        let restored = rt.block_on(memoryd::lifecycle::archival::restore_memory(
            store.relational(),
            &workspace_id,
            &created.id,
            memoryd::types::TriggeredBy::User,
            now,
        )).unwrap();

        prop_assert_eq!(&restored.content, &content);
        prop_assert_eq!(&restored.memory_type, &memory_type);
        prop_assert_eq!(restored.confidence, confidence);
        prop_assert_eq!(&restored.workspace_id, &workspace_id);
        prop_assert_eq!(restored.decay_score, 1.0);
        prop_assert_eq!(restored.access_count, created.access_count + 1);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(10))]

    /// Invariant 7 (idempotent evaluation): running the batch evaluator
    /// twice with the same `now` produces no additional transitions on the
    /// second pass, regardless of how many memories are in the workspace.
    #[test]
    fn evaluator_is_idempotent_for_a_fixed_instant(memory_count in 1usize..20) {
        let (rt, store, workspace_id) = new_store();
        for i in 0..memory_count {
            rt.block_on(store.create_memory(CreateMemoryInput {
                workspace_id: workspace_id.clone(),
                memory_type: "fact".to_string(),
                content: format!("memory {i}"),
                confidence: 0.3,
                ..Default::default()
            })).unwrap();
        }

        let config = LifecycleConfig::default();
        let policies = RetentionPolicies::from_store_config(&StoreConfig::default());
        let now = Utc::now() + Duration::days(400);

        let first = store
            .relational()
            .with_connection(|conn| tick(conn, &workspace_id, now, &config, &policies))
            .unwrap();
        let second = store
            .relational()
            .with_connection(|conn| tick(conn, &workspace_id, now, &config, &policies))
            .unwrap();

        prop_assert_eq!(second.transitioned, 0);
        prop_assert!(second.to_archive.is_empty());
        let _ = first;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(10))]

    /// Invariant 12 (cleanup safety): the cleanup pass never hard-deletes a
    /// memory that is still in the active `memories` table, whatever else
    /// is going on in the workspace.
    #[test]
    fn cleanup_never_touches_active_memories(memory_count in 1usize..15) {
        let (rt, store, workspace_id) = new_store();
        let mut ids = Vec::new();
        for i in 0..memory_count {
            let created = rt.block_on(store.create_memory(CreateMemoryInput {
                workspace_id: workspace_id.clone(),
                memory_type: "fact".to_string(),
                content: format!("active memory {i}"),
                confidence: 0.5,
                ..Default::default()
            })).unwrap();
            ids.push(created.id);
        }

        let config = LifecycleConfig::default();
        let now = Utc::now() + Duration::days(config.event_retention_days + 365);
        store
            .relational()
            .with_connection(|conn| memoryd::lifecycle::cleanup::run_cleanup(conn, &workspace_id, now, &config))
            .unwrap();

        for id in ids {
            let still_present = rt.block_on(store.get_memory(&id, &workspace_id)).unwrap();
            prop_assert!(still_present.is_some());
        }
    }
}
