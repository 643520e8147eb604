//! Embedding Provider (spec §6): `embed`/`embed_batch`, fixed dimension,
//! rejecting non-finite values. The default implementation is a TF-IDF-style
//! hashed-feature embedder adapted from the teacher's
//! `embedding::TfIdfEmbedder`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::error::{MemoryError, Result};

/// Text to fixed-dimension vector. Implementations must always return
/// vectors of `dimensions()` length with finite values.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize;
}

/// Validate a vector's shape and values against the provider's declared
/// dimension (spec §6: "must validate fixed dim, reject non-finite
/// values").
pub fn validate_embedding(vector: &[f32], expected_dim: usize) -> Result<()> {
    if vector.len() != expected_dim {
        return Err(MemoryError::validation(
            "embedding",
            format!(
                "expected {} dimensions, got {}",
                expected_dim,
                vector.len()
            ),
        ));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(MemoryError::validation(
            "embedding",
            "embedding contains non-finite values",
        ));
    }
    Ok(())
}

/// Dependency-light default embedder: hashed-feature TF-IDF-style vectors,
/// L2 normalized, with a bigram pass for a little extra semantic signal.
/// No external model or network call is involved.
pub struct TfIdfEmbeddingProvider {
    dimensions: usize,
}

impl TfIdfEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.len() > 1)
            .map(String::from)
            .collect()
    }

    fn hash_token(token: &str, dimensions: usize) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() as usize) % dimensions
    }

    fn hash_sign(token: &str) -> f32 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        format!("{}_sign", token).hash(&mut hasher);
        if hasher.finish() % 2 == 0 {
            1.0
        } else {
            -1.0
        }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let tokens = Self::tokenize(text);
        let mut embedding = vec![0.0_f32; self.dimensions];
        if tokens.is_empty() {
            return embedding;
        }

        let mut tf: HashMap<String, f32> = HashMap::new();
        for token in &tokens {
            *tf.entry(token.clone()).or_insert(0.0) += 1.0;
        }

        let doc_len = tokens.len() as f32;
        for (token, count) in tf {
            let tf_score = (1.0 + count / doc_len).ln();
            let idf_score = 1.0 + (token.len() as f32 * 0.1);
            let weight = tf_score * idf_score;
            let idx = Self::hash_token(&token, self.dimensions);
            let sign = Self::hash_sign(&token);
            embedding[idx] += weight * sign;
        }

        for window in tokens.windows(2) {
            let bigram = format!("{}_{}", window[0], window[1]);
            let idx = Self::hash_token(&bigram, self.dimensions);
            let sign = Self::hash_sign(&bigram);
            embedding[idx] += 0.5 * sign;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }
        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for TfIdfEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
