//! Consumed provider interfaces (spec §6): `LlmProvider` and
//! `EmbeddingProvider`. Concrete vendor clients are out of scope (Non-goal);
//! each trait ships one local, dependency-light default implementation so
//! the extraction pipeline and MAKER consensus extractor are runnable and
//! testable without a live vendor.

mod embedding;
mod llm;

pub use embedding::{EmbeddingProvider, TfIdfEmbeddingProvider};
pub use llm::{CompletionParams, LlmProvider, StubLlmProvider};
