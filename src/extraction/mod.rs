//! Extraction orchestrator (spec §4.4): chunk a conversation, run MAKER
//! consensus per chunk, enrich/dedup/validate the resulting candidates,
//! and persist whatever survives.

pub mod chunking;
pub mod maker;
pub mod profiles;

use std::collections::HashMap;

use tracing::{instrument, warn};

use crate::config::ChunkingFailureMode;
use crate::dedup::{self, CandidateMemory};
use crate::error::Result;
use crate::store::{CreateMemoryInput, MemoryStore};
use crate::types::{Memory, Message};

pub use profiles::ExtractionProfile;

/// Outcome classification for one orchestrator run (spec §4.4 step 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStatus {
    /// Every chunk reached consensus and every resulting memory was
    /// persisted.
    Success,
    /// At least one chunk failed to reach consensus or at least one
    /// candidate was dropped by validation, but at least one memory was
    /// persisted.
    Partial,
    /// No memory survived the pipeline.
    Failed,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub status: Option<ExtractionStatus>,
    pub memories: Vec<Memory>,
    pub chunks_processed: usize,
    pub chunks_without_consensus: usize,
    pub dropped: Vec<String>,
}

/// Run the full pipeline over `messages` (spec §4.4 steps 1-7):
/// chunk -> per-chunk MAKER consensus -> per-memory enrichment ->
/// cross-chunk dedup/merge -> validation -> persist.
#[instrument(skip(store, profile, messages))]
pub async fn extract_conversation(
    store: &MemoryStore,
    profile: &ExtractionProfile,
    workspace_id: &str,
    conversation_id: &str,
    messages: &[Message],
) -> Result<ExtractionResult> {
    let now = chrono::Utc::now();
    let chunks = chunking::chunk_messages(messages, &profile.extraction.chunking);

    let mut candidates: Vec<CandidateMemory> = Vec::new();
    let mut chunks_without_consensus = 0usize;

    for chunk in &chunks {
        let consensus = match maker::run_consensus(profile.provider.as_ref(), &chunk.text, &profile.maker).await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "maker consensus call failed for chunk");
                if profile.extraction.chunking.failure_mode == ChunkingFailureMode::FailFast {
                    return Err(e);
                }
                chunks_without_consensus += 1;
                continue;
            }
        };

        let Some(output) = consensus.consensus else {
            if profile.extraction.chunking.failure_mode == ChunkingFailureMode::FailFast {
                return Err(crate::error::MemoryError::LlmError {
                    provider: profile.provider.name().to_string(),
                    message: "chunk failed to reach MAKER consensus".to_string(),
                });
            }
            chunks_without_consensus += 1;
            continue;
        };

        let agreement_ratio = consensus.agreement_count as f32 / profile.maker.num_agents as f32;
        candidates.extend(candidates_from_output(
            &output,
            agreement_ratio,
            workspace_id,
            &chunk.message_ids,
            now,
        ));
    }

    // Per-memory enrichment (spec §4.4 step 3): deterministic id.
    let enriched: Vec<CandidateMemory> = candidates.into_iter().map(|c| dedup::enrich(c, now)).collect();

    // Deduplication, in-chunk through cross-conversation (spec §4.4 step
    // 5): ids are content-addressed within a workspace, so a single merge
    // pass over the whole batch covers every granularity at once.
    let merged = dedup::merge_candidates(enriched);

    let mut result = ExtractionResult {
        chunks_processed: chunks.len(),
        chunks_without_consensus,
        ..Default::default()
    };

    for candidate in merged {
        if !profile.accepts_type(&candidate.memory_type) {
            result.dropped.push(format!("{}: type not accepted by profile", candidate.memory_type));
            continue;
        }
        if let Err(e) = dedup::validate_candidate(&candidate, 1) {
            result.dropped.push(e.to_string());
            continue;
        }
        if candidate.confidence.unwrap_or(0.0) < profile.extraction.min_confidence {
            result.dropped.push(format!("{}: below min_confidence", candidate.memory_type));
            continue;
        }

        let metadata = build_metadata(&candidate);
        let memory = store
            .create_memory(CreateMemoryInput {
                workspace_id: workspace_id.to_string(),
                conversation_id: Some(conversation_id.to_string()),
                memory_type: candidate.memory_type.clone(),
                content: candidate.content.clone(),
                confidence: candidate.confidence.unwrap_or(0.5),
                metadata,
                embedding: None,
                id: candidate.id.clone(),
            })
            .await;

        match memory {
            Ok(m) => result.memories.push(m),
            Err(e) => result.dropped.push(format!("store rejected candidate: {e}")),
        }
    }

    result.status = Some(classify_status(&result));
    Ok(result)
}

fn candidates_from_output(
    output: &maker::MakerOutput,
    agreement_ratio: f32,
    workspace_id: &str,
    message_ids: &[String],
    now: chrono::DateTime<chrono::Utc>,
) -> Vec<CandidateMemory> {
    let mut out = Vec::new();
    let confidence = agreement_ratio.clamp(0.0, 1.0);

    out.push(base_candidate(
        "summary",
        &output.summary,
        confidence,
        workspace_id,
        message_ids,
        now,
    ));
    for decision in &output.decisions {
        out.push(base_candidate("decision", decision, confidence, workspace_id, message_ids, now));
    }
    for todo in &output.todos {
        out.push(base_candidate("todo", todo, confidence, workspace_id, message_ids, now));
    }
    out
}

fn base_candidate(
    memory_type: &str,
    content: &str,
    confidence: f32,
    workspace_id: &str,
    message_ids: &[String],
    now: chrono::DateTime<chrono::Utc>,
) -> CandidateMemory {
    CandidateMemory {
        workspace_id: workspace_id.to_string(),
        memory_type: memory_type.to_string(),
        content: content.to_string(),
        confidence: Some(confidence),
        metadata: HashMap::new(),
        source_message_ids: message_ids.to_vec(),
        created_at: Some(now),
        entity_name: None,
        id: None,
    }
}

fn build_metadata(candidate: &CandidateMemory) -> HashMap<String, serde_json::Value> {
    let mut metadata = candidate.metadata.clone();
    metadata.insert(
        "source_message_ids".to_string(),
        serde_json::to_value(&candidate.source_message_ids).unwrap_or_default(),
    );
    metadata
}

fn classify_status(result: &ExtractionResult) -> ExtractionStatus {
    if result.memories.is_empty() {
        ExtractionStatus::Failed
    } else if result.chunks_without_consensus > 0 || !result.dropped.is_empty() {
        ExtractionStatus::Partial
    } else {
        ExtractionStatus::Success
    }
}
