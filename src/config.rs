//! Per-component configuration structs (spec §6), each with a `Default`
//! impl in the teacher's own per-subsystem `StorageConfig`/
//! `EmbeddingConfig`/`SalienceConfig` style. Constructor-time `validate()`
//! is this crate's own addition (the teacher's config structs are not
//! self-validating) to enforce the spec's explicit numeric constraints.

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};

/// Configuration for the relational + vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file, or `:memory:` for an ephemeral store.
    pub db_path: String,
    /// Default TTL in milliseconds applied to a memory when the caller
    /// doesn't specify one.
    pub default_ttl_ms: i64,
    /// Multiplier applied to `default_ttl_ms` by importance (spec §4.6.4).
    pub importance_ttl_multiplier: f32,
    /// Capacity of the fire-and-forget access-tracking channel.
    pub access_tracking_queue_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: ":memory:".to_string(),
            default_ttl_ms: 30 * 24 * 60 * 60 * 1000,
            importance_ttl_multiplier: 2.0,
            access_tracking_queue_size: 1024,
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.db_path.trim().is_empty() {
            return Err(MemoryError::Configuration(
                "db_path must not be empty".into(),
            ));
        }
        if self.default_ttl_ms <= 0 {
            return Err(MemoryError::Configuration(
                "default_ttl_ms must be positive".into(),
            ));
        }
        if self.importance_ttl_multiplier < 0.0 {
            return Err(MemoryError::Configuration(
                "importance_ttl_multiplier must be non-negative".into(),
            ));
        }
        if self.access_tracking_queue_size == 0 {
            return Err(MemoryError::Configuration(
                "access_tracking_queue_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the lifecycle engine's decay model and background
/// scheduler (spec §4.6, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Decay function shape.
    #[serde(default)]
    pub decay_function: DecayFunction,
    /// Half-life in days for the exponential decay function.
    pub half_life_days: f32,
    /// Weight of access frequency in the importance score (spec §4.6.3).
    pub importance_frequency_weight: f32,
    /// Weight of confidence in the importance score.
    pub importance_confidence_weight: f32,
    /// Weight of relationship count in the importance score.
    pub importance_relationship_weight: f32,
    /// Decay score threshold below which an `Active` memory becomes
    /// `Decaying`, and above which a `Decaying` memory recovers to `Active`
    /// (spec §4.6.5 step 3). Archival itself is driven purely by effective
    /// TTL, not by this threshold — there is no separate decay-score-based
    /// archival trigger in the spec.
    pub decaying_threshold: f32,
    /// How often the background evaluator runs, in seconds. Must be >= 60
    /// to keep the scheduler from hammering the store.
    pub evaluation_interval_secs: u64,
    /// How many workspaces the background evaluator processes per batch
    /// within one pass (spec §4.6.8, §6: "batches of batch_size"). Bounds
    /// the number of workspaces touched between yield points, not the total
    /// evaluated in a pass — every workspace is still covered, just in
    /// `batch_size`-sized groups.
    pub batch_size: usize,
    /// Age, in days, past `effective_ttl` after which an archived memory is
    /// hard-deleted by the cleanup service (spec §4.6.7).
    pub cleanup_grace_period_days: i64,
    /// Age, in days, past which `LifecycleEvent` rows are pruned.
    pub event_retention_days: i64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            decay_function: DecayFunction::Exponential,
            half_life_days: 14.0,
            importance_frequency_weight: 0.3,
            importance_confidence_weight: 0.3,
            importance_relationship_weight: 0.4,
            decaying_threshold: 0.3,
            evaluation_interval_secs: 300,
            batch_size: 50,
            cleanup_grace_period_days: 30,
            event_retention_days: 180,
        }
    }
}

impl LifecycleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.half_life_days <= 0.0 {
            return Err(MemoryError::Configuration(
                "half_life_days must be positive".into(),
            ));
        }
        let weights_sum = self.importance_frequency_weight
            + self.importance_confidence_weight
            + self.importance_relationship_weight;
        if (weights_sum - 1.0).abs() > 0.01 {
            return Err(MemoryError::Configuration(format!(
                "importance weights must sum to 1.0, got {}",
                weights_sum
            )));
        }
        if !(0.0..=1.0).contains(&self.decaying_threshold) {
            return Err(MemoryError::Configuration(
                "decaying_threshold must be in [0.0, 1.0]".into(),
            ));
        }
        if self.evaluation_interval_secs < 60 {
            return Err(MemoryError::Configuration(
                "evaluation_interval_secs must be at least 60".into(),
            ));
        }
        if !(1..=10_000).contains(&self.batch_size) {
            return Err(MemoryError::Configuration(
                "batch_size must be in [1, 10000]".into(),
            ));
        }
        Ok(())
    }
}

/// Shape of the decay curve (spec §4.6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecayFunction {
    #[default]
    Exponential,
    Linear,
}

/// Configuration for the extraction orchestrator (spec §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub chunking: ChunkingConfig,
    /// Minimum confidence a candidate memory must have to survive
    /// validation.
    pub min_confidence: f32,
    /// Maximum number of chunks processed concurrently.
    pub max_concurrent_chunks: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            min_confidence: 0.5,
            max_concurrent_chunks: 4,
        }
    }
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(MemoryError::Configuration(
                "min_confidence must be in [0.0, 1.0]".into(),
            ));
        }
        if self.max_concurrent_chunks == 0 {
            return Err(MemoryError::Configuration(
                "max_concurrent_chunks must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// How a conversation's messages are split into chunks before extraction
/// (spec §4.4 step 1, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// If false, a conversation is always extracted as a single chunk
    /// regardless of its size.
    pub enabled: bool,
    pub strategy: ChunkingStrategy,
    /// Target chunk size, in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks, in characters. Must be strictly
    /// less than `chunk_size`.
    pub overlap: usize,
    /// Whether a chunk extraction failure aborts the whole conversation
    /// (`FailFast`) or is skipped so remaining chunks still run (spec §4.4
    /// step 1: "Failure mode per chunk: fail-fast or continue-on-error
    /// (default)").
    pub failure_mode: ChunkingFailureMode,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: ChunkingStrategy::SlidingWindow,
            chunk_size: 2000,
            overlap: 200,
            failure_mode: ChunkingFailureMode::ContinueOnError,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(MemoryError::Configuration(
                "chunk_size must be positive".into(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(MemoryError::Configuration(
                "overlap must be smaller than chunk_size".into(),
            ));
        }
        Ok(())
    }
}

/// Per-chunk failure handling (spec §4.4 step 1, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingFailureMode {
    FailFast,
    #[default]
    ContinueOnError,
}

/// Chunking strategy (spec §4.4 step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    #[default]
    SlidingWindow,
    MessageBoundary,
    Semantic,
}

/// Configuration for the MAKER consensus extractor (spec §4.5, §6: "fully
/// configurable (feature flag, replicas, K-threshold, temperature,
/// timeout, model)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MakerConfig {
    /// Feature flag; when false the orchestrator should fall back to a
    /// single-pass strategy rather than consensus extraction.
    pub enabled: bool,
    /// Number of independent microagent calls per chunk.
    pub num_agents: usize,
    /// Minimum number of red-flag-surviving candidates required before
    /// voting is attempted at all (the "K" in k-threshold voting, spec §1).
    pub quorum: usize,
    /// Maximum length, in characters, a single extracted memory's content
    /// may have before it is red-flagged.
    pub max_content_length: usize,
    /// Sampling temperature for every microagent call.
    pub temperature: f32,
    /// Per-microagent-call timeout, in seconds.
    pub timeout_secs: u64,
    /// Model identifier passed through to the LLM provider.
    pub model: String,
}

impl Default for MakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            num_agents: 3,
            quorum: 2,
            max_content_length: 4000,
            temperature: 0.4,
            timeout_secs: 10,
            model: "stub".to_string(),
        }
    }
}

impl MakerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_agents == 0 {
            return Err(MemoryError::Configuration(
                "num_agents must be positive".into(),
            ));
        }
        if self.quorum == 0 || self.quorum > self.num_agents {
            return Err(MemoryError::Configuration(
                "quorum must be between 1 and num_agents".into(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(MemoryError::Configuration(
                "timeout_secs must be positive".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(MemoryError::Configuration(
                "temperature must be in [0.0, 2.0]".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the context builder (spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Token budget for an assembled context window.
    pub token_budget: usize,
    /// Weight of similarity in the ranking composite.
    pub rank_similarity_weight: f32,
    /// Weight of recency in the ranking composite.
    pub rank_recency_weight: f32,
    /// Weight of confidence in the ranking composite.
    pub rank_confidence_weight: f32,
    /// Whether to expand results via relationship BFS.
    pub expand_relationships: bool,
    /// Max BFS hops when expanding relationships.
    pub max_expansion_hops: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_budget: 4000,
            rank_similarity_weight: 0.6,
            rank_recency_weight: 0.25,
            rank_confidence_weight: 0.15,
            expand_relationships: true,
            max_expansion_hops: 1,
        }
    }
}

impl ContextConfig {
    pub fn validate(&self) -> Result<()> {
        if self.token_budget == 0 {
            return Err(MemoryError::Configuration(
                "token_budget must be positive".into(),
            ));
        }
        let sum =
            self.rank_similarity_weight + self.rank_recency_weight + self.rank_confidence_weight;
        if (sum - 1.0).abs() > 0.01 {
            return Err(MemoryError::Configuration(format!(
                "rank weights must sum to 1.0, got {}",
                sum
            )));
        }
        Ok(())
    }
}
