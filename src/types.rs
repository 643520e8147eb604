//! Core data model: users, workspaces, conversations, messages, memories,
//! relationships, and lifecycle events (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// All entity ids are UUID-shaped strings. Memory ids are content-addressed
/// (see `crate::ids`); every other id is a random UUID.
pub type EntityId = String;

/// A registered user of the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The tenant isolation unit: every memory, conversation, and relationship
/// is scoped to exactly one workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: EntityId,
    pub name: String,
    #[serde(rename = "type")]
    pub workspace_type: WorkspaceType,
    pub owner_id: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Whether a workspace belongs to a single user or is shared by a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceType {
    #[default]
    Personal,
    Team,
}

impl WorkspaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceType::Personal => "personal",
            WorkspaceType::Team => "team",
        }
    }
}

impl std::str::FromStr for WorkspaceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "personal" => Ok(WorkspaceType::Personal),
            "team" => Ok(WorkspaceType::Team),
            _ => Err(format!("unknown workspace type: {}", s)),
        }
    }
}

/// A conversation thread ingested from some provider (chat app, IDE, etc.).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: EntityId,
    pub workspace_id: EntityId,
    pub provider: String,
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single turn within a conversation, the raw material the extraction
/// layer chunks and mines for memories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: EntityId,
    pub conversation_id: EntityId,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Who said a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    #[default]
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "system" => Ok(MessageRole::System),
            _ => Err(format!("unknown message role: {}", s)),
        }
    }
}

/// A single durable fact, preference, decision, or other unit of long-term
/// context extracted from a conversation (or created directly by a caller).
///
/// Invariants (spec §3): `confidence`, `importance_score`, and `decay_score`
/// are all in `[0.0, 1.0]`; `pinned == true` implies
/// `lifecycle_state == LifecycleState::Pinned`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: EntityId,
    pub workspace_id: EntityId,
    pub conversation_id: Option<EntityId>,
    #[serde(rename = "type")]
    pub memory_type: String,
    pub content: String,
    pub confidence: f32,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub lifecycle_state: LifecycleState,
    pub last_accessed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub access_count: i64,
    pub importance_score: f32,
    pub decay_score: f32,
    /// TTL in milliseconds, stretched by importance (spec §4.6.4). `None`
    /// means the memory never expires on its own (still subject to pinning
    /// and explicit archival/deletion).
    pub effective_ttl_ms: Option<i64>,
    pub pinned: bool,
    pub pinned_by: Option<EntityId>,
    pub pinned_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Memory {
    /// True if every numeric invariant in spec §3 holds. Used by tests and
    /// by the store layer as a last-line assertion before a write.
    pub fn invariants_hold(&self) -> bool {
        let in_unit = |x: f32| (0.0..=1.0).contains(&x);
        if !in_unit(self.confidence) || !in_unit(self.importance_score) || !in_unit(self.decay_score)
        {
            return false;
        }
        if self.pinned && self.lifecycle_state != LifecycleState::Pinned {
            return false;
        }
        true
    }
}

/// A memory moved out of the active table by the archival service
/// (spec §4.6.6). Same shape as `Memory`, with a guaranteed `archived_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedMemory {
    pub id: EntityId,
    pub workspace_id: EntityId,
    pub conversation_id: Option<EntityId>,
    #[serde(rename = "type")]
    pub memory_type: String,
    pub content: String,
    pub confidence: f32,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub importance_score: f32,
    pub decay_score: f32,
    pub access_count: i64,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub archived_at: DateTime<Utc>,
}

impl From<Memory> for ArchivedMemory {
    fn from(m: Memory) -> Self {
        ArchivedMemory {
            id: m.id,
            workspace_id: m.workspace_id,
            conversation_id: m.conversation_id,
            memory_type: m.memory_type,
            content: m.content,
            confidence: m.confidence,
            metadata: m.metadata,
            created_at: m.created_at,
            updated_at: m.updated_at,
            importance_score: m.importance_score,
            decay_score: m.decay_score,
            access_count: m.access_count,
            last_accessed_at: m.last_accessed_at,
            archived_at: m.archived_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Lifts an archived row back into the shared `Memory` shape for read paths
/// that present active and archived memories side by side (spec §4.2's
/// `include_archived` search union). Lifecycle fields with no archived-table
/// counterpart (`pinned`, `effective_ttl_ms`, `expires_at`, ...) take their
/// rest-state defaults; callers needing a live record should `restore` first.
impl From<ArchivedMemory> for Memory {
    fn from(a: ArchivedMemory) -> Self {
        Memory {
            id: a.id,
            workspace_id: a.workspace_id,
            conversation_id: a.conversation_id,
            memory_type: a.memory_type,
            content: a.content,
            confidence: a.confidence,
            metadata: a.metadata,
            created_at: a.created_at,
            updated_at: a.updated_at,
            lifecycle_state: LifecycleState::Archived,
            last_accessed_at: a.last_accessed_at,
            access_count: a.access_count,
            importance_score: a.importance_score,
            decay_score: a.decay_score,
            effective_ttl_ms: None,
            pinned: false,
            pinned_by: None,
            pinned_at: None,
            archived_at: Some(a.archived_at),
            expires_at: None,
        }
    }
}

/// Lifecycle state machine (spec §4.6.1). `Pinned` is a terminal bypass:
/// automatic transitions never move a memory out of it. `Expired` is fully
/// terminal: no transition leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Active,
    Decaying,
    Archived,
    Expired,
    Pinned,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Active => "active",
            LifecycleState::Decaying => "decaying",
            LifecycleState::Archived => "archived",
            LifecycleState::Expired => "expired",
            LifecycleState::Pinned => "pinned",
        }
    }

    /// Whether a transition from `self` to `next` is permitted under *some*
    /// trigger (spec §4.6.1's table collapsed across the system/user
    /// columns). `crate::lifecycle::state_machine::validate_transition` is
    /// the trigger-sensitive version the evaluator and archival service
    /// actually call; this is the cheap structural check used by tests and
    /// callers that don't care which trigger would apply.
    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        match (self, next) {
            (Expired, _) => false,
            (Pinned, Active) | (Pinned, Decaying) => true,
            (Pinned, _) => false,
            (_, Pinned) => true,
            (Active, Decaying) | (Active, Archived) => true,
            (Decaying, Active) | (Decaying, Archived) => true,
            (Archived, Active) | (Archived, Expired) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(LifecycleState::Active),
            "decaying" => Ok(LifecycleState::Decaying),
            "archived" => Ok(LifecycleState::Archived),
            "expired" => Ok(LifecycleState::Expired),
            "pinned" => Ok(LifecycleState::Pinned),
            _ => Err(format!("unknown lifecycle state: {}", s)),
        }
    }
}

/// A directed edge between two memories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: EntityId,
    pub from_memory_id: EntityId,
    pub to_memory_id: EntityId,
    pub relationship_type: String,
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
}

/// An append-only record of a lifecycle state change, kept for audit and
/// for the batch evaluator's idempotency checks (spec §4.6.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub id: EntityId,
    pub memory_id: EntityId,
    pub workspace_id: EntityId,
    pub previous_state: LifecycleState,
    pub new_state: LifecycleState,
    pub reason: String,
    pub triggered_by: TriggeredBy,
    pub user_id: Option<EntityId>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Who caused a lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggeredBy {
    #[default]
    System,
    User,
}

impl TriggeredBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggeredBy::System => "system",
            TriggeredBy::User => "user",
        }
    }
}

impl std::str::FromStr for TriggeredBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(TriggeredBy::System),
            "user" => Ok(TriggeredBy::User),
            _ => Err(format!("unknown trigger: {}", s)),
        }
    }
}

/// Options for listing memories within a workspace (spec §4.2: "type set,
/// ordering, limit in [1,1000], offset >= 0").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListOptions {
    pub types: Option<Vec<String>>,
    pub order: ListOrder,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Sort order for `list_memories`, by `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListOrder {
    Asc,
    #[default]
    Desc,
}

/// Options for `search_memories` (spec §4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOptions {
    pub vector: Option<Vec<f32>>,
    pub text: Option<String>,
    pub types: Option<Vec<String>>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub limit: i64,
    #[serde(default)]
    pub include_archived: bool,
}
