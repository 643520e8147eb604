//! LLM Provider (spec §6): plain completion and schema-constrained
//! completion. Concrete vendor clients are out of scope (Non-goal); the
//! default implementation is a deterministic stub used by tests and the
//! MAKER consensus harness.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Parameters accepted by every completion call (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionParams {
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.4
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            model: "stub".to_string(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

/// Plain completion and schema-constrained completion (spec §6). Errors
/// must carry enough information for `MemoryError::classify_llm_error` to
/// tell a rate limit from a parse failure from a generic vendor error.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str, params: &CompletionParams) -> Result<String>;

    /// Complete and parse the result against `schema` (a JSON Schema
    /// object). The default implementation calls `complete` and parses the
    /// response as JSON without enforcing the schema; providers that
    /// support native structured output should override this.
    async fn complete_structured(
        &self,
        prompt: &str,
        _schema: &serde_json::Value,
        params: &CompletionParams,
    ) -> Result<serde_json::Value> {
        let raw = self.complete(prompt, params).await?;
        serde_json::from_str(strip_code_fence(&raw)).map_err(|e| {
            crate::error::MemoryError::classify_llm_error(
                self.name(),
                format!("failed to parse JSON response: {}", e),
            )
        })
    }
}

/// Strip a leading/trailing Markdown code-fence wrapper (```` ``` ```` or
/// ```` ```json ````) that LLMs routinely wrap structured replies in before
/// the JSON payload is parsed (spec §4.5 step 2: "strip any code-fence
/// wrapper"). Falls through unchanged if there is no fence.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_prefix('\n').unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// A deterministic stub provider: `complete` echoes a canned response keyed
/// by prompt content, `complete_structured` returns a fixed JSON value. Used
/// by the extraction pipeline's default profile and by MAKER consensus
/// tests, since no concrete vendor client ships with this crate.
pub struct StubLlmProvider {
    name: String,
    response: String,
}

impl StubLlmProvider {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            name: "stub".to_string(),
            response: response.into(),
        }
    }

    pub fn failing(name: impl Into<String>, error_message: impl Into<String>) -> FailingLlmProvider {
        FailingLlmProvider {
            name: name.into(),
            error_message: error_message.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for StubLlmProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, _prompt: &str, _params: &CompletionParams) -> Result<String> {
        Ok(self.response.clone())
    }
}

/// A stub provider that always fails, used to exercise MAKER's
/// dropped-on-failure microagent path and the orchestrator's error mapping.
pub struct FailingLlmProvider {
    name: String,
    error_message: String,
}

#[async_trait]
impl LlmProvider for FailingLlmProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, _prompt: &str, _params: &CompletionParams) -> Result<String> {
        Err(crate::error::MemoryError::classify_llm_error(
            &self.name,
            self.error_message.clone(),
        ))
    }
}
