//! Deterministic content-addressed identifiers (spec §4.2, §9).
//!
//! Memory ids are a pure function of `(type, normalized_content, workspace_id)`
//! so that re-extracting the same conversation yields the same memory id
//! (spec invariant 9, "dedup stability"). All id generation routes through
//! this module so normalization stays consistent across the store, the
//! extraction orchestrator, and the dedup/validator layer.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Normalize text for hashing and comparison: lowercase, trim, collapse
/// internal whitespace to single spaces.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Project a 256-bit hash into a UUID-shaped string (spec §9: "use a 256-bit
/// hash projected into a UUID-shaped string"). We take the first 16 bytes of
/// the SHA-256 digest and format them as a UUID, setting version/variant
/// bits so the result is a syntactically valid (if not RFC-random) UUID.
fn hash_to_uuid(digest: &[u8]) -> Uuid {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    // Version 8 (custom/hash-derived), RFC 4122 variant.
    bytes[6] = (bytes[6] & 0x0f) | 0x80;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    Uuid::from_bytes(bytes)
}

/// Compute the deterministic memory id for `(type, normalized_content,
/// workspace_id)`. Callers that need to include extra disambiguating
/// material (e.g. `entityType ":" normalize(name)` for entity memories)
/// should fold it into `content` before calling this function, per spec
/// §4.4 step 3.
pub fn memory_id(memory_type: &str, content: &str, workspace_id: &str) -> String {
    let normalized_content = normalize(content);
    let input = format!("{}:{}:{}", memory_type, normalized_content, workspace_id);
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    hash_to_uuid(&digest).to_string()
}

/// Compute the hash input used for an entity memory, which folds the entity
/// type and normalized name into the content before hashing (spec §4.4
/// step 3: "for entities include `entityType ":" normalize(name)` in the
/// hash input").
pub fn entity_hash_content(entity_type: &str, name: &str, content: &str) -> String {
    format!("{}:{}:{}", entity_type, normalize(name), content)
}

/// Generate a random UUID-shaped id for entities that are not
/// content-addressed (users, workspaces, conversations, messages,
/// relationships, lifecycle events).
pub fn random_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize("  Hello   World  "), "hello world");
    }

    #[test]
    fn memory_id_is_deterministic() {
        let a = memory_id("fact", "Kubernetes is great", "ws-1");
        let b = memory_id("fact", "kubernetes   is GREAT", "ws-1");
        assert_eq!(a, b);
    }

    #[test]
    fn memory_id_varies_with_workspace() {
        let a = memory_id("fact", "same content", "ws-1");
        let b = memory_id("fact", "same content", "ws-2");
        assert_ne!(a, b);
    }

    #[test]
    fn memory_id_varies_with_type() {
        let a = memory_id("fact", "same content", "ws-1");
        let b = memory_id("decision", "same content", "ws-1");
        assert_ne!(a, b);
    }

    #[test]
    fn memory_id_is_uuid_shaped() {
        let id = memory_id("fact", "content", "ws-1");
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn random_id_is_uuid_shaped() {
        assert!(Uuid::parse_str(&random_id()).is_ok());
    }
}
