//! Conversation memory: turn history cached in process and persisted per
//! `(session, user)` in SQLite, plus the turn orchestration built on top.

pub mod cache;
pub mod store;
pub mod turn;
pub mod types;

pub use cache::ConversationCache;
pub use store::{SessionStore, SqliteSessionStore};
pub use turn::{run_turn, AgentReply, CatalogResponder, Responder, TurnOutcome};
pub use types::{ConversationMemory, Role, SessionId, SessionKey, SessionSummary, Turn, UserId};
