//! Durable session persistence.
//!
//! Every [`SessionStore`] read and write is keyed by `(session id, user id)`.
//! A session id paired with the wrong user behaves exactly like an unknown id.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::types::{SessionId, SessionKey, Turn, UserId};
use crate::error::StoreError;

/// A persisted session as returned by [`SessionStore::list`].
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub session_id: SessionId,
    pub created_at: String,
    pub last_activity: String,
    pub turns: Vec<Turn>,
}

pub trait SessionStore: Send + Sync {
    /// Persisted turns for `key`, or `None` when no such session exists for that user.
    fn load(&self, key: &SessionKey) -> Result<Option<Vec<Turn>>, StoreError>;

    /// Insert or overwrite the full history for `key`.
    fn upsert(&self, key: &SessionKey, turns: &[Turn]) -> Result<(), StoreError>;

    /// A user's sessions, most recent activity first.
    fn list(&self, user_id: UserId, limit: usize) -> Result<Vec<StoredSession>, StoreError>;
}

/// Serialized form of the `session_data` column.
#[derive(Serialize, Deserialize)]
struct SessionData {
    messages: Vec<Turn>,
    message_count: usize,
}

fn encode_turns(turns: &[Turn]) -> Result<String, StoreError> {
    Ok(serde_json::to_string(&SessionData {
        messages: turns.to_vec(),
        message_count: turns.len(),
    })?)
}

fn decode_turns(raw: &str) -> Result<Vec<Turn>, StoreError> {
    let data: SessionData = serde_json::from_str(raw)?;
    Ok(data.messages)
}

/// Fixed-width UTC timestamps so `ORDER BY last_activity` sorts chronologically.
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Clone)]
pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl SessionStore for SqliteSessionStore {
    fn load(&self, key: &SessionKey) -> Result<Option<Vec<Turn>>, StoreError> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT session_data FROM chat_sessions WHERE session_id = ?1 AND user_id = ?2",
                params![key.session_id.to_string(), key.user_id.0],
                |row| row.get(0),
            )
            .optional()?;
        raw.as_deref().map(decode_turns).transpose()
    }

    fn upsert(&self, key: &SessionKey, turns: &[Turn]) -> Result<(), StoreError> {
        let data = encode_turns(turns)?;
        let now = now_timestamp();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO chat_sessions (session_id, user_id, session_data, created_at, last_activity) \
             VALUES (?1, ?2, ?3, ?4, ?4) \
             ON CONFLICT(session_id, user_id) DO UPDATE SET \
             session_data = excluded.session_data, last_activity = excluded.last_activity",
            params![key.session_id.to_string(), key.user_id.0, data, now],
        )?;
        Ok(())
    }

    fn list(&self, user_id: UserId, limit: usize) -> Result<Vec<StoredSession>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, session_data, created_at, last_activity FROM chat_sessions \
             WHERE user_id = ?1 \
             ORDER BY last_activity DESC, created_at DESC, session_id DESC \
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![user_id.0, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, data, created_at, last_activity)| {
                let session_id = SessionId::parse(&id)
                    .map_err(|_| StoreError::Malformed(format!("session id {id:?}")))?;
                Ok(StoredSession {
                    session_id,
                    created_at,
                    last_activity,
                    turns: decode_turns(&data)?,
                })
            })
            .collect()
    }
}
