//! Error taxonomy for the memory store, lifecycle engine, and extraction layer.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MemoryError>;

/// The tagged error taxonomy described by the system specification (spec §7).
///
/// Every public operation returns this type verbatim; callers match on the
/// variant rather than inspecting message strings.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("validation failed on field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {message}")]
    Database { message: String },

    #[error("vector store error: {message}")]
    VectorStore { message: String },

    #[error("LLM provider error ({provider}): {message}")]
    LlmError { provider: String, message: String },

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimit { retry_after_ms: u64 },

    #[error("parse error: {message}")]
    ParseError {
        message: String,
        raw_response: Option<String>,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "http")]
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl MemoryError {
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        MemoryError::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        MemoryError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        MemoryError::Database {
            message: message.into(),
        }
    }

    pub fn vector_store(message: impl Into<String>) -> Self {
        MemoryError::VectorStore {
            message: message.into(),
        }
    }

    /// Classify a raw provider error message into the taxonomy's LLM-facing
    /// variants, per the extraction orchestrator's error mapping rules
    /// (spec §4.4): rate-limit phrases, then parse/JSON phrases, else generic.
    pub fn classify_llm_error(provider: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("rate limit") || lower.contains("429") || lower.contains("too many requests")
        {
            MemoryError::RateLimit {
                retry_after_ms: 1000,
            }
        } else if lower.contains("parse")
            || lower.contains("json")
            || lower.contains("malformed")
            || lower.contains("unexpected token")
        {
            MemoryError::ParseError {
                message,
                raw_response: None,
            }
        } else {
            MemoryError::LlmError {
                provider: provider.to_string(),
                message,
            }
        }
    }

    /// Whether this error is worth retrying at a higher level.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MemoryError::RateLimit { .. }
                | MemoryError::VectorStore { .. }
                | MemoryError::Database { .. }
        )
    }
}
