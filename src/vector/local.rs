//! Local (in-process) vector index: normalized cosine similarity over
//! vectors held in memory, grounded on the teacher's
//! `embedding::cosine_similarity`.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{cosine_similarity, Filter, VectorAdapter, VectorMatch};
use crate::error::Result;

struct Entry {
    vector: Vec<f32>,
    metadata: serde_json::Value,
}

/// An in-memory vector index guarded by a lock (spec §4.3: "Local mode...
/// Stores vectors in memory...upsert/delete are trivially consistent with
/// the relational row").
#[derive(Default)]
pub struct LocalVectorIndex {
    entries: RwLock<HashMap<String, Entry>>,
}

impl LocalVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorAdapter for LocalVectorIndex {
    async fn upsert(&self, id: &str, vector: Vec<f32>, metadata: serde_json::Value) -> Result<()> {
        self.entries
            .write()
            .insert(id.to_string(), Entry { vector, metadata });
        Ok(())
    }

    async fn search(&self, vector: &[f32], top_k: usize, filter: &Filter) -> Result<Vec<VectorMatch>> {
        let entries = self.entries.read();
        let mut scored: Vec<VectorMatch> = entries
            .iter()
            .filter(|(_, entry)| filter.matches(&entry.metadata))
            .map(|(id, entry)| VectorMatch {
                id: id.clone(),
                score: cosine_similarity(vector, &entry.vector),
                metadata: entry.metadata.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.entries.write().remove(id);
        Ok(())
    }
}
