//! Vector Adapter (spec §4.3): upsert/search/delete of `(id, vector,
//! metadata)` triples against an index that is either local (in-process
//! cosine similarity) or remote (an HTTP vector index, a Non-goal to ship a
//! concrete client for).

mod local;

pub use local::LocalVectorIndex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single vector-adapter filter condition on one metadata field.
/// Supports the DSL named in spec §4.3/§6: equality, set membership
/// (`$in`), and range (`$gte`, `$lte`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq(serde_json::Value),
    In(Vec<serde_json::Value>),
    Gte(serde_json::Value),
    Lte(serde_json::Value),
}

/// A conjunction of per-field filter conditions. The memory store always
/// pins `workspace_id` via `Eq`; callers add `type`/`created_at` conditions
/// on top (spec §4.2: "a metadata filter that pins workspace_id and applies
/// type/date filters").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filter {
    pub conditions: Vec<(String, FilterOp)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.conditions.push((field.into(), FilterOp::Eq(value.into())));
        self
    }

    pub fn in_set(mut self, field: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        self.conditions.push((field.into(), FilterOp::In(values)));
        self
    }

    pub fn gte(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.conditions.push((field.into(), FilterOp::Gte(value.into())));
        self
    }

    pub fn lte(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.conditions.push((field.into(), FilterOp::Lte(value.into())));
        self
    }

    /// True if `metadata` satisfies every condition.
    pub fn matches(&self, metadata: &serde_json::Value) -> bool {
        self.conditions.iter().all(|(field, op)| {
            let Some(value) = metadata.get(field) else {
                return false;
            };
            match op {
                FilterOp::Eq(expected) => value == expected,
                FilterOp::In(options) => options.contains(value),
                FilterOp::Gte(bound) => compare_json(value, bound).map(|o| o.is_ge()).unwrap_or(false),
                FilterOp::Lte(bound) => compare_json(value, bound).map(|o| o.is_le()).unwrap_or(false),
            }
        })
    }
}

fn compare_json(a: &serde_json::Value, b: &serde_json::Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (serde_json::Value::Number(a), serde_json::Value::Number(b)) => {
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (serde_json::Value::String(a), serde_json::Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// A single vector search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub metadata: serde_json::Value,
}

/// Vector index operations (spec §4.3). `Local` computes normalized cosine
/// similarity in-process; `Remote` is a seam for an HTTP-backed index with
/// no default concrete client, consistent with the Non-goal on shipping
/// vendor integrations.
#[async_trait]
pub trait VectorAdapter: Send + Sync {
    async fn upsert(&self, id: &str, vector: Vec<f32>, metadata: serde_json::Value) -> Result<()>;
    async fn search(&self, vector: &[f32], top_k: usize, filter: &Filter) -> Result<Vec<VectorMatch>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Cosine similarity: `dot(a,b) / (||a||*||b||)`, 0 for a zero vector
/// (spec §4.3, invariant 11). Dimension mismatch is a hard error at the
/// adapter boundary; this free function instead returns 0.0 so it stays a
/// total function for the property tests in spec §8.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_self_similarity_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        let v = vec![1.0, 2.0, 3.0];
        let zero = vec![0.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&v, &zero), 0.0);
    }

    #[test]
    fn cosine_is_symmetric() {
        let a = vec![1.0, 0.5, -2.0];
        let b = vec![-1.0, 3.0, 0.25];
        assert!((cosine_similarity(&a, &b) - cosine_similarity(&b, &a)).abs() < 1e-6);
    }

    #[test]
    fn filter_matches_conjunction() {
        let filter = Filter::new()
            .eq("workspace_id", "ws1")
            .gte("created_at", 100);
        let metadata = serde_json::json!({"workspace_id": "ws1", "created_at": 150});
        assert!(filter.matches(&metadata));
        let metadata_low = serde_json::json!({"workspace_id": "ws1", "created_at": 50});
        assert!(!filter.matches(&metadata_low));
    }

    #[test]
    fn filter_in_set() {
        let filter = Filter::new().in_set("type", vec!["fact".into(), "decision".into()]);
        assert!(filter.matches(&serde_json::json!({"type": "fact"})));
        assert!(!filter.matches(&serde_json::json!({"type": "entity"})));
    }
}
