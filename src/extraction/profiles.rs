//! Extraction profiles (spec §4.1, §4.4): named bundles of chunking
//! strategy, provider choice, and acceptance thresholds, so a caller can
//! pick "fast" vs "thorough" extraction for a conversation without
//! threading every knob through the call site.

use std::sync::Arc;

use crate::config::{ChunkingConfig, ExtractionConfig, MakerConfig};
use crate::providers::LlmProvider;

/// A named extraction configuration.
pub struct ExtractionProfile {
    pub name: String,
    pub extraction: ExtractionConfig,
    pub maker: MakerConfig,
    pub provider: Arc<dyn LlmProvider>,
    /// Memory types this profile is willing to emit; `None` means no
    /// restriction.
    pub memory_types: Option<Vec<String>>,
}

impl ExtractionProfile {
    pub fn new(name: impl Into<String>, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            name: name.into(),
            extraction: ExtractionConfig::default(),
            maker: MakerConfig::default(),
            provider,
            memory_types: None,
        }
    }

    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.extraction.chunking = chunking;
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.extraction.min_confidence = min_confidence;
        self
    }

    pub fn with_memory_types(mut self, memory_types: Vec<String>) -> Self {
        self.memory_types = Some(memory_types);
        self
    }

    /// True if `memory_type` is acceptable under this profile's allowlist.
    pub fn accepts_type(&self, memory_type: &str) -> bool {
        match &self.memory_types {
            Some(allowed) => allowed.iter().any(|t| t == memory_type),
            None => true,
        }
    }
}
