//! In-memory conversation cache in front of a [`SessionStore`].
//!
//! Per `(session, user)` key the cache is either absent or holds a live
//! [`ConversationMemory`]. `get_memory` loads from the store on a miss (or starts
//! an empty history), `save` writes the full history back, and eviction only
//! drops the in-memory copy. Persisted rows are never deleted here.
//!
//! Capacity is enforced by [`ConversationCache::cleanup`], which evicts in
//! insertion order. This is not LRU; an evicted entry is simply reloaded from
//! the store on next use.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use super::store::SessionStore;
use super::types::{preview_of, ConversationMemory, SessionId, SessionKey, SessionSummary, Turn, UserId};
use crate::config::ConversationConfig;
use crate::error::{PaintError, PaintResult, StoreError};

struct Entry {
    seq: u64,
    memory: ConversationMemory,
}

#[derive(Default)]
struct Entries {
    map: HashMap<SessionKey, Entry>,
    next_seq: u64,
}

impl Entries {
    fn insert(&mut self, key: SessionKey, memory: ConversationMemory) -> ConversationMemory {
        let seq = self.next_seq;
        let entry = self.map.entry(key).or_insert_with(|| Entry { seq, memory });
        if entry.seq == seq {
            self.next_seq += 1;
        }
        entry.memory.clone()
    }
}

pub struct ConversationCache {
    store: Arc<dyn SessionStore>,
    entries: Mutex<Entries>,
    max_entries: usize,
    max_user_sessions: usize,
    preview_chars: usize,
}

impl ConversationCache {
    pub fn new(store: Arc<dyn SessionStore>, config: &ConversationConfig) -> Self {
        Self {
            store,
            entries: Mutex::new(Entries::default()),
            max_entries: config.max_cache_size,
            max_user_sessions: config.max_user_sessions,
            preview_chars: config.preview_chars,
        }
    }

    // Map operations never leave it half-updated, so a poisoned lock is safe to reuse.
    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The live history for `key`: cached, loaded from the store, or new and empty.
    pub async fn get_memory(&self, key: &SessionKey) -> PaintResult<ConversationMemory> {
        if let Some(entry) = self.entries().map.get(key) {
            debug!(session = %key.session_id, user = %key.user_id, "conversation cache hit");
            return Ok(entry.memory.clone());
        }

        let turns = self.with_store(*key, |store, key| store.load(&key)).await?;
        let memory = match turns {
            Some(turns) => {
                debug!(session = %key.session_id, turns = turns.len(), "session loaded from store");
                ConversationMemory::from_turns(turns)
            }
            None => {
                debug!(session = %key.session_id, "no stored history, starting empty");
                ConversationMemory::default()
            }
        };

        Ok(self.entries().insert(*key, memory))
    }

    /// Persist the full history in `memory` for `key`.
    pub async fn save(&self, key: &SessionKey, memory: &ConversationMemory) -> PaintResult<()> {
        let turns = memory.snapshot();
        let count = turns.len();
        self.with_store(*key, move |store, key| store.upsert(&key, &turns))
            .await?;
        debug!(session = %key.session_id, turns = count, "session saved");
        Ok(())
    }

    /// Start a new, empty session for `user_id`, cached and persisted.
    pub async fn create_session(&self, user_id: UserId) -> PaintResult<SessionId> {
        let key = SessionKey::new(SessionId::new(), user_id);
        let memory = self.entries().insert(key, ConversationMemory::default());
        self.save(&key, &memory).await?;
        info!(session = %key.session_id, user = %user_id, "session created");
        Ok(key.session_id)
    }

    /// Drop the cached copy of `key`. Returns whether an entry was resident.
    /// The persisted history is left in place.
    pub fn reset(&self, key: &SessionKey) -> bool {
        let removed = self.entries().map.remove(key).is_some();
        if removed {
            debug!(session = %key.session_id, user = %key.user_id, "session evicted");
        }
        removed
    }

    /// Evict down to the configured ceiling. Returns the number evicted.
    pub fn cleanup(&self) -> usize {
        self.cleanup_to(self.max_entries)
    }

    /// Evict oldest-inserted entries until at most `max_entries` remain.
    pub fn cleanup_to(&self, max_entries: usize) -> usize {
        let mut entries = self.entries();
        let excess = entries.map.len().saturating_sub(max_entries);
        if excess == 0 {
            return 0;
        }

        let mut by_age: Vec<(u64, SessionKey)> =
            entries.map.iter().map(|(k, e)| (e.seq, *k)).collect();
        by_age.sort_unstable_by_key(|(seq, _)| *seq);
        for (_, key) in by_age.into_iter().take(excess) {
            entries.map.remove(&key);
        }

        info!(evicted = excess, remaining = entries.map.len(), "conversation cache cleaned up");
        excess
    }

    pub fn len(&self) -> usize {
        self.entries().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().map.is_empty()
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.entries().map.contains_key(key)
    }

    /// Strict history lookup: cached or persisted turns, `None` for an unknown
    /// session (or a session belonging to another user). Never creates an entry.
    pub async fn history(&self, key: &SessionKey) -> PaintResult<Option<Vec<Turn>>> {
        if let Some(entry) = self.entries().map.get(key) {
            return Ok(Some(entry.memory.snapshot()));
        }
        Ok(self.with_store(*key, |store, key| store.load(&key)).await?)
    }

    /// A user's sessions, most recent activity first. Read-only; the cache is not touched.
    pub async fn list_sessions(
        &self,
        user_id: UserId,
        limit: Option<usize>,
    ) -> PaintResult<Vec<SessionSummary>> {
        let limit = limit.unwrap_or(self.max_user_sessions);
        if limit == 0 {
            return Err(PaintError::validation("limit must be at least 1"));
        }
        let limit = limit.min(self.max_user_sessions);

        let store = Arc::clone(&self.store);
        let stored = tokio::task::spawn_blocking(move || store.list(user_id, limit))
            .await
            .map_err(StoreError::from)??;

        let entries = self.entries();
        Ok(stored
            .into_iter()
            .map(|s| SessionSummary {
                active: entries
                    .map
                    .contains_key(&SessionKey::new(s.session_id, user_id)),
                message_count: s.turns.len(),
                preview: preview_of(&s.turns, self.preview_chars),
                session_id: s.session_id,
                created_at: s.created_at,
                last_activity: s.last_activity,
            })
            .collect())
    }

    /// The user's most recently active session, if any.
    pub async fn latest_session(&self, user_id: UserId) -> PaintResult<Option<SessionId>> {
        let store = Arc::clone(&self.store);
        let stored = tokio::task::spawn_blocking(move || store.list(user_id, 1))
            .await
            .map_err(StoreError::from)??;
        Ok(stored.into_iter().next().map(|s| s.session_id))
    }

    async fn with_store<T, F>(&self, key: SessionKey, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SessionStore, SessionKey) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref(), key)).await?
    }
}
