//! Performance benchmarks for the context builder's ranking and assembly
//! stages.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use memoryd::config::{ContextConfig, StoreConfig};
use memoryd::context::{build_context, ContextOptions};
use memoryd::providers::{EmbeddingProvider, TfIdfEmbeddingProvider};
use memoryd::relational::SqliteStore;
use memoryd::store::{queries, CreateMemoryInput, MemoryStore};
use memoryd::types::WorkspaceType;
use memoryd::vector::LocalVectorIndex;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn bench_build_context(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let embedder = TfIdfEmbeddingProvider::new(64);

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

        for i in 0..200 {
            let content = format!("memory {i} discusses billing migrations and vendor cutovers");
            let embedding = embedder.embed(&content).await.unwrap();
            store
                .create_memory(CreateMemoryInput {
                    workspace_id: workspace_id.clone(),
                    memory_type: "fact".to_string(),
                    content,
                    confidence: 0.7,
                    embedding: Some(embedding),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        (store, workspace_id)
    });

    let config = ContextConfig::default();
    let options = ContextOptions::default();

    c.bench_function("build_context_200_memories", |b| {
        b.iter(|| {
            rt.block_on(build_context(
                black_box(&store),
                black_box(&embedder),
                black_box("billing migration vendor"),
                black_box(&workspace_id),
                &options,
                &config,
            ))
            .unwrap()
        })
    });
}

criterion_group!(benches, bench_build_context);
criterion_main!(benches);
