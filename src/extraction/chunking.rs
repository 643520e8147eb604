//! Chunking (spec §4.4 step 1): split a conversation's messages into
//! overlapping windows sized for a single extraction call.

use crate::config::{ChunkingConfig, ChunkingStrategy};
use crate::types::Message;

/// A contiguous run of messages to extract from together, with the
/// concatenated text an `LlmProvider` actually sees.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub text: String,
    pub message_ids: Vec<String>,
}

/// Decide how `messages` should be split (spec §4.4 step 1). A
/// conversation shorter than one chunk is never split, regardless of
/// strategy: chunking exists to bound a single extraction call's input
/// size, not to fragment short conversations.
pub fn chunk_messages(messages: &[Message], config: &ChunkingConfig) -> Vec<Chunk> {
    if messages.is_empty() {
        return Vec::new();
    }

    if !config.enabled {
        return vec![Chunk {
            text: messages.iter().map(format_message).collect::<Vec<_>>().join("\n"),
            message_ids: messages.iter().map(|m| m.id.clone()).collect(),
        }];
    }

    match config.strategy {
        ChunkingStrategy::SlidingWindow => sliding_window(messages, config),
        ChunkingStrategy::MessageBoundary => message_boundary(messages, config),
        // No dedicated topic-shift detector is wired up; semantic chunking
        // degrades to message-boundary chunking, which already avoids
        // splitting a single message across chunks.
        ChunkingStrategy::Semantic => message_boundary(messages, config),
    }
}

fn format_message(message: &Message) -> String {
    format!("{:?}: {}", message.role, message.content)
}

/// Fixed-size character windows over the formatted transcript, with
/// `config.overlap` characters of repeated context between consecutive
/// chunks. A chunk's `message_ids` are every message that contributed any
/// character to its window.
fn sliding_window(messages: &[Message], config: &ChunkingConfig) -> Vec<Chunk> {
    let mut spans: Vec<(String, usize, usize)> = Vec::new(); // (message_id, start, end) in the joined text
    let mut joined = String::new();
    for message in messages {
        let formatted = format_message(message);
        let start = joined.len();
        joined.push_str(&formatted);
        joined.push('\n');
        spans.push((message.id.clone(), start, joined.len()));
    }

    if joined.len() <= config.chunk_size {
        return vec![Chunk {
            text: joined,
            message_ids: messages.iter().map(|m| m.id.clone()).collect(),
        }];
    }

    let step = config.chunk_size - config.overlap;
    let mut chunks = Vec::new();
    let mut offset = 0;
    while offset < joined.len() {
        let end = (offset + config.chunk_size).min(joined.len());
        let text = joined[offset..end].to_string();
        let message_ids = spans
            .iter()
            .filter(|(_, s, e)| *s < end && *e > offset)
            .map(|(id, _, _)| id.clone())
            .collect();
        chunks.push(Chunk { text, message_ids });
        if end == joined.len() {
            break;
        }
        offset += step;
    }
    chunks
}

/// Greedily group whole messages into chunks up to `chunk_size`, never
/// splitting a message across two chunks, with the last `overlap`-sized
/// suffix of messages from one chunk repeated at the start of the next.
fn message_boundary(messages: &[Message], config: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current: Vec<&Message> = Vec::new();
    let mut current_len = 0usize;

    for message in messages {
        let formatted = format_message(message);
        if current_len + formatted.len() > config.chunk_size && !current.is_empty() {
            chunks.push(build_chunk(&current));
            let overlap_start = overlap_start_index(&current, config.overlap);
            current = current[overlap_start..].to_vec();
            current_len = current.iter().map(|m| format_message(m).len()).sum();
        }
        current_len += formatted.len();
        current.push(message);
    }
    if !current.is_empty() {
        chunks.push(build_chunk(&current));
    }
    chunks
}

fn overlap_start_index(messages: &[&Message], overlap: usize) -> usize {
    let mut acc = 0usize;
    for (i, message) in messages.iter().enumerate().rev() {
        acc += format_message(message).len();
        if acc >= overlap {
            return i;
        }
    }
    0
}

fn build_chunk(messages: &[&Message]) -> Chunk {
    let text = messages.iter().map(|m| format_message(m)).collect::<Vec<_>>().join("\n");
    let message_ids = messages.iter().map(|m| m.id.clone()).collect();
    Chunk { text, message_ids }
}
