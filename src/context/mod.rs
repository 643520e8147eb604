//! Context Builder (spec §4.7): turn a query into a token-budgeted,
//! template-rendered context string. Pipeline: embed query -> vector search
//! -> rank -> optional relationship expansion -> template assembly.
//! Grounded on the teacher's `intelligence::session_context` (memory-to-query
//! assembly with relevance scores) and `search::rerank` (pluggable ranking
//! strategies), generalized into one query-facing builder.

pub mod ranker;

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::ContextConfig;
use crate::error::Result;
use crate::providers::EmbeddingProvider;
use crate::store::MemoryStore;
use crate::types::{Memory, SearchOptions};

pub use ranker::{CustomRankFn, RankStrategy, ScoredMemory};

/// A counter for estimated prompt tokens; defaults to `chars / 4` (spec §4.7
/// step 5) when none is injected.
pub type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

fn estimate_tokens(text: &str, counter: Option<&TokenCounter>) -> usize {
    match counter {
        Some(f) => f(text),
        None => ((text.len() as f32) / 4.0).ceil() as usize,
    }
}

/// The rendering template for assembled context (spec §4.7 step 5):
/// a header, a per-memory format with `{type}`/`{content}`/`{score}`
/// placeholders, a separator between memories, and a footer.
#[derive(Debug, Clone)]
pub struct ContextTemplate {
    pub header: String,
    pub memory_format: String,
    pub separator: String,
    pub footer: String,
}

impl Default for ContextTemplate {
    fn default() -> Self {
        Self {
            header: String::new(),
            memory_format: "- ({type}) {content}".to_string(),
            separator: "\n".to_string(),
            footer: String::new(),
        }
    }
}

impl ContextTemplate {
    fn render(&self, scored: &ScoredMemory) -> String {
        self.memory_format
            .replace("{type}", &scored.memory.memory_type)
            .replace("{content}", &scored.memory.content)
            .replace("{score}", &format!("{:.3}", scored.score))
    }
}

/// Options for one `build_context`/`preview` call (spec §4.7).
pub struct ContextOptions {
    /// Restrict the candidate pool to these memory types.
    pub types: Option<Vec<String>>,
    /// How many candidates to pull from the vector search before ranking.
    pub candidate_limit: i64,
    /// Ranking strategy; defaults to the config's weighted composite.
    pub strategy: RankStrategy,
    /// Overrides `ContextConfig::expand_relationships` when set.
    pub expand_relationships: Option<bool>,
    /// Overrides `ContextConfig::max_expansion_hops` when set.
    pub relationship_depth: Option<usize>,
    pub template: ContextTemplate,
    pub token_counter: Option<TokenCounter>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            types: None,
            candidate_limit: 50,
            strategy: RankStrategy::default(),
            expand_relationships: None,
            relationship_depth: None,
            template: ContextTemplate::default(),
            token_counter: None,
        }
    }
}

/// Result of `build_context` (spec §4.7 step 6).
#[derive(Debug, Clone)]
pub struct ContextResult {
    pub context: String,
    pub token_count: usize,
    pub memories: Vec<Memory>,
    pub truncated: bool,
    pub template: ContextTemplate,
}

/// Result of `preview`: the same as `ContextResult` plus diagnostics (spec
/// §4.7 step 6).
#[derive(Debug, Clone)]
pub struct ContextPreview {
    pub result: ContextResult,
    pub memory_ids: Vec<String>,
    pub ranking_scores: Vec<f32>,
    pub budget_used_pct: f32,
}

/// Run the context-builder pipeline (spec §4.7 steps 1-6): embed, search,
/// rank, optionally expand via relationships, assemble under a token
/// budget.
pub async fn build_context(
    store: &MemoryStore,
    embedder: &dyn EmbeddingProvider,
    query_text: &str,
    workspace_id: &str,
    options: &ContextOptions,
    config: &ContextConfig,
) -> Result<ContextResult> {
    let vector = embedder.embed(query_text).await?;

    let search_options = SearchOptions {
        vector: Some(vector),
        types: options.types.clone(),
        limit: options.candidate_limit,
        ..Default::default()
    };
    let hits = store.search_memories(workspace_id, &search_options).await?;

    let expanded = if options.expand_relationships.unwrap_or(config.expand_relationships) {
        let depth = options.relationship_depth.unwrap_or(config.max_expansion_hops);
        expand_via_relationships(store, workspace_id, hits, depth).await?
    } else {
        hits
    };

    let ranked = ranker::rank(expanded, &options.strategy, config);
    let (context, token_count, memories, truncated) =
        assemble(&ranked, &options.template, config.token_budget, options.token_counter.as_ref());

    Ok(ContextResult {
        context,
        token_count,
        memories,
        truncated,
        template: options.template.clone(),
    })
}

/// Same pipeline as `build_context`, with diagnostics attached (spec §4.7
/// step 6: "A `preview` call returns the same plus diagnostic
/// `{memoryIds, rankingScores, budgetUsed %}`").
pub async fn preview(
    store: &MemoryStore,
    embedder: &dyn EmbeddingProvider,
    query_text: &str,
    workspace_id: &str,
    options: &ContextOptions,
    config: &ContextConfig,
) -> Result<ContextPreview> {
    let vector = embedder.embed(query_text).await?;

    let search_options = SearchOptions {
        vector: Some(vector),
        types: options.types.clone(),
        limit: options.candidate_limit,
        ..Default::default()
    };
    let hits = store.search_memories(workspace_id, &search_options).await?;

    let expanded = if options.expand_relationships.unwrap_or(config.expand_relationships) {
        let depth = options.relationship_depth.unwrap_or(config.max_expansion_hops);
        expand_via_relationships(store, workspace_id, hits, depth).await?
    } else {
        hits
    };

    let ranked = ranker::rank(expanded, &options.strategy, config);
    let memory_ids: Vec<String> = ranked.iter().map(|s| s.memory.id.clone()).collect();
    let ranking_scores: Vec<f32> = ranked.iter().map(|s| s.score).collect();

    let (context, token_count, memories, truncated) =
        assemble(&ranked, &options.template, config.token_budget, options.token_counter.as_ref());
    let budget_used_pct = if config.token_budget == 0 {
        0.0
    } else {
        (token_count as f32 / config.token_budget as f32 * 100.0).min(100.0)
    };

    Ok(ContextPreview {
        result: ContextResult {
            context,
            token_count,
            memories,
            truncated,
            template: options.template.clone(),
        },
        memory_ids,
        ranking_scores,
        budget_used_pct,
    })
}

/// Breadth-first expand `seed` through relationships up to `max_depth` hops,
/// deduplicating memories already seen at an earlier depth (spec §4.7 step
/// 4). A discovered memory inherits its originating hop's similarity scaled
/// by `0.8` per hop, so it still competes in the same ranking pass without
/// outranking a directly matched memory of equal relevance.
async fn expand_via_relationships(
    store: &MemoryStore,
    workspace_id: &str,
    seed: Vec<(Memory, f32)>,
    max_depth: usize,
) -> Result<Vec<(Memory, f32)>> {
    let mut seen: HashSet<String> = seed.iter().map(|(m, _)| m.id.clone()).collect();
    let mut all = seed.clone();
    let mut frontier = seed;

    for _ in 0..max_depth {
        let mut next_frontier = Vec::new();
        for (memory, similarity) in &frontier {
            let relationships = store.get_memory_relationships(&memory.id, workspace_id)?;
            for relationship in relationships {
                let other_id = if relationship.from_memory_id == memory.id {
                    &relationship.to_memory_id
                } else {
                    &relationship.from_memory_id
                };
                if seen.contains(other_id) {
                    continue;
                }
                let Some(other) = store.get_memory(other_id, workspace_id).await? else {
                    continue;
                };
                seen.insert(other.id.clone());
                let inherited = similarity * 0.8;
                all.push((other.clone(), inherited));
                next_frontier.push((other, inherited));
            }
        }
        if next_frontier.is_empty() {
            break;
        }
        frontier = next_frontier;
    }

    Ok(all)
}

fn assemble(
    ranked: &[ScoredMemory],
    template: &ContextTemplate,
    token_budget: usize,
    counter: Option<&TokenCounter>,
) -> (String, usize, Vec<Memory>, bool) {
    let mut token_count = estimate_tokens(&template.header, counter);
    let footer_tokens = estimate_tokens(&template.footer, counter);

    let mut pieces: Vec<String> = Vec::new();
    let mut included: Vec<Memory> = Vec::new();
    let mut truncated = token_count + footer_tokens > token_budget;

    for scored in ranked {
        let rendered = template.render(scored);
        let addition = if pieces.is_empty() {
            estimate_tokens(&rendered, counter)
        } else {
            estimate_tokens(&template.separator, counter) + estimate_tokens(&rendered, counter)
        };

        if token_count + addition + footer_tokens > token_budget && !pieces.is_empty() {
            truncated = true;
            break;
        }

        token_count += addition;
        pieces.push(rendered);
        included.push(scored.memory.clone());
    }

    if included.len() < ranked.len() {
        truncated = true;
    }
    token_count += footer_tokens;

    let context = format!("{}{}{}", template.header, pieces.join(&template.separator), template.footer);
    (context, token_count, included, truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::providers::TfIdfEmbeddingProvider;
    use crate::relational::SqliteStore;
    use crate::store::{queries, CreateMemoryInput};
    use crate::types::WorkspaceType;
    use crate::vector::LocalVectorIndex;

    async fn setup() -> (MemoryStore, String, TfIdfEmbeddingProvider) {
        let relational = SqliteStore::open_in_memory().unwrap();
        let workspace_id = relational
            .with_connection(|conn| {
                let user = queries::create_user(conn, "a@example.com", None)?;
                let ws = queries::create_workspace(conn, "ws", WorkspaceType::Personal, &user.id)?;
                Ok(ws.id)
            })
            .unwrap();
        let store = MemoryStore::new(relational, Arc::new(LocalVectorIndex::new()), StoreConfig::default());
        (store, workspace_id, TfIdfEmbeddingProvider::new(32))
    }

    async fn seed(store: &MemoryStore, workspace_id: &str, embedder: &TfIdfEmbeddingProvider, content: &str) -> Memory {
        let embedding = embedder.embed(content).await.unwrap();
        store
            .create_memory(CreateMemoryInput {
                workspace_id: workspace_id.to_string(),
                memory_type: "fact".into(),
                content: content.to_string(),
                confidence: 0.8,
                embedding: Some(embedding),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn builds_context_within_token_budget() {
        let (store, workspace_id, embedder) = setup().await;
        seed(&store, &workspace_id, &embedder, "Kubernetes orchestrates containers").await;
        seed(&store, &workspace_id, &embedder, "Postgres is a relational database").await;

        let config = ContextConfig {
            token_budget: 1000,
            ..ContextConfig::default()
        };
        let options = ContextOptions::default();
        let result = build_context(&store, &embedder, "containers orchestration", &workspace_id, &options, &config)
            .await
            .unwrap();

        assert!(!result.memories.is_empty());
        assert!(!result.truncated);
        assert!(result.context.contains("fact"));
    }

    #[tokio::test]
    async fn tiny_token_budget_truncates() {
        let (store, workspace_id, embedder) = setup().await;
        seed(&store, &workspace_id, &embedder, "Kubernetes orchestrates containers across a cluster").await;
        seed(&store, &workspace_id, &embedder, "Postgres is a relational database engine").await;

        let config = ContextConfig {
            token_budget: 5,
            ..ContextConfig::default()
        };
        let options = ContextOptions::default();
        let result = build_context(&store, &embedder, "containers", &workspace_id, &options, &config)
            .await
            .unwrap();

        assert!(result.truncated);
    }

    #[tokio::test]
    async fn relationship_expansion_pulls_in_linked_memories() {
        let (store, workspace_id, embedder) = setup().await;
        let anchor = seed(&store, &workspace_id, &embedder, "Kubernetes orchestrates containers").await;
        let related = seed(&store, &workspace_id, &embedder, "totally unrelated gardening tip").await;
        store
            .create_relationship(&anchor.id, &related.id, "related_to", 0.9)
            .await
            .unwrap();

        let config = ContextConfig {
            token_budget: 1000,
            expand_relationships: true,
            max_expansion_hops: 1,
            ..ContextConfig::default()
        };
        let mut options = ContextOptions::default();
        options.candidate_limit = 1;
        let result = build_context(&store, &embedder, "containers orchestration", &workspace_id, &options, &config)
            .await
            .unwrap();

        let ids: Vec<&str> = result.memories.iter().map(|m| m.id.as_str()).collect();
        assert!(ids.contains(&related.id.as_str()));
    }

    #[tokio::test]
    async fn preview_reports_diagnostics() {
        let (store, workspace_id, embedder) = setup().await;
        seed(&store, &workspace_id, &embedder, "Kubernetes orchestrates containers").await;

        let config = ContextConfig::default();
        let options = ContextOptions::default();
        let preview = preview(&store, &embedder, "containers", &workspace_id, &options, &config)
            .await
            .unwrap();

        assert_eq!(preview.memory_ids.len(), preview.ranking_scores.len());
        assert!(preview.budget_used_pct <= 100.0);
    }
}
