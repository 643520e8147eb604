//! Dedup/Validator (spec §4.2, §4.4 step 3/5/6): deterministic content ids,
//! memory merge rules, per-field validation, relationship integrity. Sits
//! between the extraction orchestrator's raw LLM output and the memory
//! store's `create_memory`/`create_relationship`.

mod schema;

pub use schema::{FieldType, TypeSchema, ValidationError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::ids;

/// A memory as it looks right after an LLM strategy returns it: optional
/// fields not yet defaulted, no id yet, no lifecycle fields (those belong
/// to the store, not the extraction layer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateMemory {
    pub workspace_id: String,
    #[serde(rename = "type")]
    pub memory_type: String,
    pub content: String,
    pub confidence: Option<f32>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub source_message_ids: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// For `type == "entity"`: the entity's name, folded into the id hash
    /// input alongside the type (spec §4.4 step 3).
    pub entity_name: Option<String>,
    /// Populated by `enrich`; absent on raw LLM output.
    pub id: Option<String>,
}

/// Fill defaults and compute the deterministic id (spec §4.4 step 3).
/// Idempotent: enriching an already-enriched candidate recomputes the same
/// id and leaves already-set fields alone.
pub fn enrich(mut candidate: CandidateMemory, now: DateTime<Utc>) -> CandidateMemory {
    if candidate.confidence.is_none() {
        candidate.confidence = Some(0.5);
    }
    if candidate.created_at.is_none() {
        candidate.created_at = Some(now);
    }

    let hash_content = match (&candidate.memory_type[..], &candidate.entity_name) {
        ("entity", Some(name)) => ids::entity_hash_content(&candidate.memory_type, name, &candidate.content),
        _ => candidate.content.clone(),
    };
    candidate.id = Some(ids::memory_id(&candidate.memory_type, &hash_content, &candidate.workspace_id));

    candidate
}

/// Merge a batch of enriched candidates that share an id (spec §4.4 step 5:
/// "memories with equal id merge — keep the highest confidence; union
/// source_message_ids; earliest created_at; merge metadata preferring
/// fields from the highest-confidence memory, back-filling missing fields
/// from others"). Candidates without an id are passed through one-per-group
/// (nothing to merge against).
///
/// Preserves the order groups were first seen, which makes merge output
/// deterministic across repeated runs over the same input order (spec
/// invariant 9 depends on ids being stable; this keeps merge output stable
/// too, which matters for the idempotency tests downstream).
pub fn merge_candidates(candidates: Vec<CandidateMemory>) -> Vec<CandidateMemory> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<CandidateMemory>> = HashMap::new();

    for candidate in candidates {
        let key = candidate.id.clone().unwrap_or_else(|| format!("__no_id_{}", order.len()));
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(candidate);
    }

    order
        .into_iter()
        .map(|key| {
            let mut group = groups.remove(&key).expect("group present for its own key");
            if group.len() == 1 {
                return group.pop().expect("len checked above");
            }
            merge_group(group)
        })
        .collect()
}

fn merge_group(mut group: Vec<CandidateMemory>) -> CandidateMemory {
    group.sort_by(|a, b| {
        b.confidence
            .unwrap_or(0.0)
            .partial_cmp(&a.confidence.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut primary = group[0].clone();

    let mut source_ids: Vec<String> = Vec::new();
    let mut seen_source_ids = HashSet::new();
    let mut earliest_created_at = primary.created_at;

    for candidate in &group {
        for source_id in &candidate.source_message_ids {
            if seen_source_ids.insert(source_id.clone()) {
                source_ids.push(source_id.clone());
            }
        }
        if let Some(created_at) = candidate.created_at {
            earliest_created_at = Some(match earliest_created_at {
                Some(existing) => existing.min(created_at),
                None => created_at,
            });
        }
    }

    // Back-fill metadata fields missing from the highest-confidence
    // candidate with values from lower-confidence candidates, in
    // descending-confidence order, without overwriting anything primary
    // already set.
    for candidate in &group[1..] {
        for (field, value) in &candidate.metadata {
            primary.metadata.entry(field.clone()).or_insert_with(|| value.clone());
        }
    }

    primary.source_message_ids = source_ids;
    primary.created_at = earliest_created_at;
    primary
}

/// Per-field validation (spec §4.4 step 6): drop memories with missing
/// required fields, confidence outside `[0,1]`, or content shorter than
/// `min_content_length`.
pub fn validate_candidate(candidate: &CandidateMemory, min_content_length: usize) -> Result<(), ValidationError> {
    if candidate.memory_type.trim().is_empty() {
        return Err(ValidationError::new("type", "memory type must not be empty"));
    }
    if candidate.content.trim().len() < min_content_length {
        return Err(ValidationError::new(
            "content",
            format!("content shorter than minimum length {min_content_length}"),
        ));
    }
    match candidate.confidence {
        Some(c) if (0.0..=1.0).contains(&c) => {}
        Some(_) => return Err(ValidationError::new("confidence", "confidence must be in [0,1]")),
        None => return Err(ValidationError::new("confidence", "confidence is required after enrichment")),
    }
    Ok(())
}

/// A relationship as returned by an extraction strategy, before the
/// endpoints are known to have survived validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRelationship {
    pub from_memory_id: String,
    pub to_memory_id: String,
    pub relationship_type: String,
    pub confidence: f32,
}

/// Relationship integrity (spec §4.4 step 6, §3): both endpoints must have
/// survived candidate validation and must agree on workspace. `workspace_by_id`
/// maps a surviving candidate's id to its workspace.
pub fn validate_relationship(
    relationship: &CandidateRelationship,
    workspace_by_id: &HashMap<String, String>,
) -> Result<(), ValidationError> {
    let from_ws = workspace_by_id
        .get(&relationship.from_memory_id)
        .ok_or_else(|| ValidationError::new("from_memory_id", "endpoint did not survive validation"))?;
    let to_ws = workspace_by_id
        .get(&relationship.to_memory_id)
        .ok_or_else(|| ValidationError::new("to_memory_id", "endpoint did not survive validation"))?;
    if from_ws != to_ws {
        return Err(ValidationError::new("workspace_id", "relationship endpoints disagree on workspace"));
    }
    Ok(())
}
