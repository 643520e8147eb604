//! Performance benchmarks for the lifecycle evaluator's decay/importance
//! scoring and the batch `tick` pass.

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use memoryd::config::{LifecycleConfig, StoreConfig};
use memoryd::lifecycle::decay::decay_score;
use memoryd::lifecycle::evaluator::tick;
use memoryd::lifecycle::importance::{importance_score, ImportanceMetrics};
use memoryd::lifecycle::retention::RetentionPolicies;
use memoryd::relational::SqliteStore;
use memoryd::store::{queries, CreateMemoryInput, MemoryStore};
use memoryd::types::WorkspaceType;
use memoryd::vector::LocalVectorIndex;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn bench_decay_score(c: &mut Criterion) {
    let config = LifecycleConfig::default();
    let last_accessed = Utc::now() - chrono::Duration::days(10);
    let now = Utc::now();

    c.bench_function("decay_score", |b| {
        b.iter(|| decay_score(black_box(last_accessed), black_box(now), black_box(&config)))
    });
}

fn bench_importance_score(c: &mut Criterion) {
    let config = LifecycleConfig::default();
    let metrics = ImportanceMetrics {
        access_count: 42,
        confidence: 0.8,
        relationship_count: 5,
    };

    c.bench_function("importance_score", |b| {
        b.iter(|| importance_score(black_box(&metrics), black_box(&config)))
    });
}

fn bench_evaluator_tick(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (store, workspace_id) = rt.block_on(async {
        let relational = SqliteStore::open_in_memory().unwrap();
        let workspace_id = relational
            .with_connection(|conn| {
                let user = queries::create_user(conn, "bench@example.com", None)?;
                let ws = queries::create_workspace(conn, "bench-ws", WorkspaceType::Personal, &user.id)?;
                Ok(ws.id)
            })
            .unwrap();
        let store = MemoryStore::new(relational, Arc::new(LocalVectorIndex::new()), StoreConfig::default());
        for i in 0..500 {
            store
                .create_memory(CreateMemoryInput {
                    workspace_id: workspace_id.clone(),
                    memory_type: "fact".to_string(),
                    content: format!("memory {i}"),
                    confidence: 0.5,
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        (store, workspace_id)
    });

    let lifecycle_config = LifecycleConfig::default();
    let policies = RetentionPolicies::from_store_config(&StoreConfig::default());

    c.bench_function("evaluator_tick_500_memories", |b| {
        b.iter(|| {
            store
                .relational()
                .with_connection(|conn| {
                    tick(
                        conn,
                        black_box(&workspace_id),
                        black_box(Utc::now()),
                        &lifecycle_config,
                        &policies,
                    )
                })
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_decay_score, bench_importance_score, bench_evaluator_tick);
criterion_main!(benches);
