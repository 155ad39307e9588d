//! Conversation type definitions.
//!
//! Sessions are always addressed by [`SessionKey`], the `(session id, user id)`
//! pair; nothing addresses a session by id alone.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PaintError, PaintResult};

/// Authenticated user identifier, as supplied by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Public session identifier (a UUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// A fresh, time-ordered session id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parse a client-supplied id. Malformed ids are a validation error.
    pub fn parse(raw: &str) -> PaintResult<Self> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| PaintError::validation(format!("malformed session id: {raw}")))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub session_id: SessionId,
    pub user_id: UserId,
}

impl SessionKey {
    pub fn new(session_id: SessionId, user_id: UserId) -> Self {
        Self { session_id, user_id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "human")]
    Human,
    #[serde(rename = "ai")]
    Assistant,
}

/// One message in a conversation. Persisted as `{"type": ..., "content": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(rename = "type")]
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn human(content: impl Into<String>) -> Self {
        Self { role: Role::Human, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Shared, mutable turn history for one cached session.
///
/// Cloning yields another handle to the same history. Concurrent turns on the
/// same session may interleave; only one turn per session at a time is expected.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    turns: Arc<Mutex<Vec<Turn>>>,
}

impl ConversationMemory {
    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns: Arc::new(Mutex::new(turns)) }
    }

    fn guard(&self) -> MutexGuard<'_, Vec<Turn>> {
        self.turns.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, turn: Turn) {
        self.guard().push(turn);
    }

    pub fn add_human(&self, content: impl Into<String>) {
        self.push(Turn::human(content));
    }

    pub fn add_assistant(&self, content: impl Into<String>) {
        self.push(Turn::assistant(content));
    }

    /// Copy of the current history, in arrival order.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.guard().clone()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Whether both handles point at the same history.
    pub fn same_as(&self, other: &ConversationMemory) -> bool {
        Arc::ptr_eq(&self.turns, &other.turns)
    }
}

/// Derived, read-only view of a persisted session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub created_at: String,
    pub last_activity: String,
    pub message_count: usize,
    pub preview: String,
    /// Whether the session is currently resident in the conversation cache.
    pub active: bool,
}

pub const NO_MESSAGES_PREVIEW: &str = "No messages";

/// First human turn, cut to `max_chars` characters with `...` when longer.
pub fn preview_of(turns: &[Turn], max_chars: usize) -> String {
    let Some(first) = turns
        .iter()
        .find(|t| t.role == Role::Human && !t.content.is_empty())
    else {
        return NO_MESSAGES_PREVIEW.to_string();
    };
    let mut chars = first.content.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_parse() {
        let id = SessionId::new();
        assert_eq!(SessionId::parse(&id.to_string()).unwrap(), id);
        assert!(matches!(
            SessionId::parse("not-a-uuid"),
            Err(PaintError::Validation(_))
        ));
    }

    #[test]
    fn turn_serializes_with_type_tag() {
        let json = serde_json::to_string(&Turn::assistant("Olá")).unwrap();
        assert_eq!(json, r#"{"type":"ai","content":"Olá"}"#);
        let back: Turn = serde_json::from_str(r#"{"type":"human","content":"Oi"}"#).unwrap();
        assert_eq!(back, Turn::human("Oi"));
    }

    #[test]
    fn memory_handles_share_history() {
        let memory = ConversationMemory::default();
        let other = memory.clone();
        other.add_human("Oi");
        assert_eq!(memory.len(), 1);
        assert!(memory.same_as(&other));
        assert!(!memory.same_as(&ConversationMemory::default()));
    }

    #[test]
    fn preview_uses_first_human_turn() {
        let turns = vec![Turn::assistant("Bem-vindo"), Turn::human("Quero tinta azul")];
        assert_eq!(preview_of(&turns, 100), "Quero tinta azul");
        assert_eq!(preview_of(&turns, 5), "Quero...");
        assert_eq!(preview_of(&[], 100), NO_MESSAGES_PREVIEW);
    }

    #[test]
    fn preview_counts_characters_not_bytes() {
        let turns = vec![Turn::human("ção ção")];
        assert_eq!(preview_of(&turns, 3), "ção...");
    }
}
