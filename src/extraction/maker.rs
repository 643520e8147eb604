//! MAKER consensus extractor (spec §4.5): run `num_agents` independent
//! microagents over the same chunk, red-flag malformed outputs, and take
//! the exact-string-overlap majority among what survives.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

use crate::config::MakerConfig;
use crate::error::{MemoryError, Result};
use crate::providers::{CompletionParams, LlmProvider};

/// The structured shape every microagent is asked to return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MakerOutput {
    pub summary: String,
    #[serde(default)]
    pub decisions: Vec<String>,
    #[serde(default)]
    pub todos: Vec<String>,
}

/// Outcome of one MAKER consensus run over a chunk.
#[derive(Debug, Clone, Default)]
pub struct ConsensusResult {
    /// The winning output, if enough candidates survived red-flagging.
    pub consensus: Option<MakerOutput>,
    /// How many agents produced a clean (non-red-flagged) output, when a
    /// consensus was reached; 0 otherwise.
    pub agreement_count: usize,
    /// Outputs dropped for being malformed, with the reason.
    pub red_flagged: Vec<String>,
}

const MAKER_SCHEMA_HINT: &str = r#"{"summary": "string", "decisions": ["string"], "todos": ["string"]}"#;

/// Run `config.num_agents` independent completions over `chunk_text` and
/// vote. The microagents are launched concurrently (spec §4.5: "N parallel
/// microagents"), each wrapped in `config.timeout_secs` and treated as
/// failed on timeout (spec §5: "the MAKER microagent wraps each call with
/// an abort signal and marks the candidate as failed on timeout"); a
/// failing agent is dropped, not retried, consistent with the orchestrator
/// treating partial extraction as acceptable.
pub async fn run_consensus(provider: &dyn LlmProvider, chunk_text: &str, config: &MakerConfig) -> Result<ConsensusResult> {
    let prompt = format!(
        "Extract a summary, decisions, and todos from the following conversation excerpt. \
         Respond as JSON matching {MAKER_SCHEMA_HINT}.\n\n{chunk_text}"
    );
    let params = CompletionParams {
        model: config.model.clone(),
        temperature: config.temperature,
        max_tokens: None,
    };
    let schema = schema_value();
    let timeout = Duration::from_secs(config.timeout_secs);

    let calls = (0..config.num_agents).map(|_| {
        let prompt = prompt.clone();
        let schema = schema.clone();
        let params = params.clone();
        async {
            match tokio::time::timeout(timeout, provider.complete_structured(&prompt, &schema, &params)).await {
                Ok(inner) => inner,
                Err(_) => Err(MemoryError::classify_llm_error(provider.name(), "microagent call timed out")),
            }
        }
    });
    let raw_results = join_all(calls).await;

    let mut outputs: Vec<MakerOutput> = Vec::new();
    let mut red_flagged = Vec::new();

    for result in raw_results {
        let raw = match result {
            Ok(v) => v,
            Err(e) => {
                red_flagged.push(format!("agent call failed: {e}"));
                continue;
            }
        };
        match parse_and_flag(&raw, config) {
            Ok(output) => outputs.push(output),
            Err(reason) => red_flagged.push(reason),
        }
    }

    let consensus = vote(&outputs, config.quorum);
    // Confidence signal for the orchestrator: how many agents produced a
    // clean, red-flag-free output at all (not how much their content
    // overlapped with the winner).
    let agreement_count = if consensus.is_some() { outputs.len() } else { 0 };

    Ok(ConsensusResult {
        consensus,
        agreement_count,
        red_flagged,
    })
}

fn schema_value() -> Value {
    serde_json::json!({
        "type": "object",
        "required": ["summary", "decisions", "todos"],
        "properties": {
            "summary": {"type": "string"},
            "decisions": {"type": "array", "items": {"type": "string"}},
            "todos": {"type": "array", "items": {"type": "string"}}
        }
    })
}

/// Parse a raw agent response and apply spec §4.5's red-flag rules:
/// summary length outside [20, 1500], decisions and todos both empty with
/// a summary under 50 characters, or any non-string array element.
fn parse_and_flag(raw: &Value, config: &MakerConfig) -> std::result::Result<MakerOutput, String> {
    let summary = raw
        .get("summary")
        .and_then(Value::as_str)
        .ok_or_else(|| "missing summary field".to_string())?
        .to_string();

    let decisions = string_array(raw, "decisions")?;
    let todos = string_array(raw, "todos")?;

    if summary.len() < 20 || summary.len() > 1500 {
        return Err(format!("summary length {} outside [20, 1500]", summary.len()));
    }
    if summary.len() > config.max_content_length {
        return Err(format!("summary length {} exceeds max_content_length", summary.len()));
    }
    if decisions.is_empty() && todos.is_empty() && summary.len() < 50 {
        return Err("empty decisions and todos with a summary under 50 characters".to_string());
    }

    Ok(MakerOutput { summary, decisions, todos })
}

fn string_array(raw: &Value, field: &str) -> std::result::Result<Vec<String>, String> {
    let Some(array) = raw.get(field).and_then(Value::as_array) else {
        return Err(format!("missing {field} field"));
    };
    array
        .iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(|| format!("non-string element in {field}")))
        .collect()
}

/// Score one candidate by counting exact-string overlaps of its decisions
/// and todos against every *other* candidate's decisions and todos (spec
/// §4.5 step 3). Each of the candidate's own items contributes at most one
/// point per other candidate whose decisions+todos contain that exact
/// string; duplicates within `candidate`'s own lists each get their own
/// chance to match.
fn overlap_score(candidate: &MakerOutput, outputs: &[MakerOutput]) -> usize {
    let own: Vec<&String> = candidate.decisions.iter().chain(candidate.todos.iter()).collect();
    let mut score = 0;
    for other in outputs {
        if std::ptr::eq(other, candidate) {
            continue;
        }
        let other_items: HashSet<&String> = other.decisions.iter().chain(other.todos.iter()).collect();
        score += own.iter().filter(|item| other_items.contains(*item)).count();
    }
    score
}

/// K-threshold voting (spec §1, §4.5 step 3): at least `min_survivors`
/// red-flag-free candidates are required before voting is attempted, then
/// each is scored by `overlap_score` and the highest-scoring candidate
/// wins. Ties are broken by iteration order: later candidates win ties
/// over earlier ones, so among equally-scored candidates the vote prefers
/// whichever was produced last (spec §4.5 step 3, §9).
fn vote(outputs: &[MakerOutput], min_survivors: usize) -> Option<MakerOutput> {
    if outputs.is_empty() || outputs.len() < min_survivors.max(1) {
        return None;
    }

    let mut best_index = 0;
    let mut best_score = overlap_score(&outputs[0], outputs);
    for (i, candidate) in outputs.iter().enumerate().skip(1) {
        let score = overlap_score(candidate, outputs);
        if score >= best_score {
            best_score = score;
            best_index = i;
        }
    }
    Some(outputs[best_index].clone())
}
