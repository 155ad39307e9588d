#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use paintwise::catalog::store::{insert_product, CandidateQuery};
use paintwise::catalog::{Environment, NewProduct, Product, ProductStore, RetrievalEngine, SqliteProductStore};
use paintwise::config::{ConversationConfig, RetrievalConfig};
use paintwise::conversation::store::StoredSession;
use paintwise::conversation::{ConversationCache, SessionKey, SessionStore, SqliteSessionStore, Turn, UserId};
use paintwise::db;
use paintwise::embedding::{encode_embedding, EmbeddingProvider};
use paintwise::error::{ProviderError, StoreError};
use rusqlite::{params, Connection};

pub const DIMS: usize = 8;

/// Open a fresh in-memory database with the schema initialized.
pub fn test_db() -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(db::open_memory_database().unwrap()))
}

/// Deterministic unit vector with a spike at `axis`.
pub fn spike(axis: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    v[axis % DIMS] = 1.0;
    v
}

/// Unit vector whose cosine similarity to `spike(0)` is exactly `similarity`.
pub fn at_similarity(similarity: f32) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    v[0] = similarity;
    v[1] = (1.0 - similarity * similarity).max(0.0).sqrt();
    v
}

pub fn paint(name: &str, environment: Environment, features: &[&str]) -> NewProduct {
    NewProduct {
        name: name.into(),
        color: "Branco Gelo".into(),
        surface_types: vec!["parede".into()],
        environment,
        finish_type: "fosco".into(),
        features: features.iter().map(|f| f.to_string()).collect(),
        product_line: "Premium".into(),
        price: Some(150.0),
        ai_summary: None,
        usage_tags: vec![],
    }
}

/// Insert a product, optionally with a stored embedding. Returns its id.
pub fn seed(db: &Arc<Mutex<Connection>>, product: NewProduct, embedding: Option<Vec<f32>>) -> i64 {
    let conn = db.lock().unwrap();
    let id = insert_product(&conn, &product).unwrap();
    if let Some(e) = embedding {
        conn.execute(
            "UPDATE paint_products SET embedding = ?1 WHERE id = ?2",
            params![encode_embedding(&e), id],
        )
        .unwrap();
    }
    id
}

pub fn embedded_count(db: &Arc<Mutex<Connection>>) -> i64 {
    db.lock()
        .unwrap()
        .query_row(
            "SELECT COUNT(*) FROM paint_products WHERE embedding IS NOT NULL",
            [],
            |row| row.get(0),
        )
        .unwrap()
}

// ── Embedding providers ───────────────────────────────────────────────────────

/// Returns a scripted vector per input text (or `fallback`), counting calls.
pub struct ScriptedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    /// Vectors for any text containing the needle.
    containing: Vec<(String, Vec<f32>)>,
    fallback: Vec<f32>,
    /// Texts containing any of these substrings fail.
    failing: Vec<String>,
    /// Batch calls fail, forcing the per-item path.
    fail_batches: bool,
    pub embed_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
}

impl ScriptedEmbedder {
    pub fn new() -> Self {
        Self {
            vectors: HashMap::new(),
            containing: vec![],
            fallback: spike(1),
            failing: vec![],
            fail_batches: false,
            embed_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn with_containing(mut self, needle: &str, vector: Vec<f32>) -> Self {
        self.containing.push((needle.to_string(), vector));
        self
    }

    pub fn failing_on(mut self, needle: &str) -> Self {
        self.failing.push(needle.to_string());
        self
    }

    pub fn failing_batches(mut self) -> Self {
        self.fail_batches = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst) + self.batch_calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if self.failing.iter().any(|n| text.contains(n.as_str())) {
            return Err(ProviderError::Status {
                status: 400,
                body: "input rejected".into(),
            });
        }
        if let Some(v) = self.vectors.get(text) {
            return Ok(v.clone());
        }
        Ok(self
            .containing
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedEmbedder {
    fn model(&self) -> &str {
        "scripted"
    }

    fn dimensions(&self) -> usize {
        DIMS
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.vector_for(text)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_batches {
            return Err(ProviderError::Status {
                status: 429,
                body: "rate limited".into(),
            });
        }
        texts.iter().map(|t| self.vector_for(t)).collect()
    }
}

/// Always fails, like a provider outage.
pub struct DownEmbedder {
    pub calls: AtomicUsize,
}

impl DownEmbedder {
    pub fn new() -> Self {
        Self { calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl EmbeddingProvider for DownEmbedder {
    fn model(&self) -> &str {
        "down"
    }

    fn dimensions(&self) -> usize {
        DIMS
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::Status {
            status: 503,
            body: "service unavailable".into(),
        })
    }
}

/// Never answers within any reasonable timeout.
pub struct StalledEmbedder;

#[async_trait]
impl EmbeddingProvider for StalledEmbedder {
    fn model(&self) -> &str {
        "stalled"
    }

    fn dimensions(&self) -> usize {
        DIMS
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(spike(0))
    }
}

// ── Stores ────────────────────────────────────────────────────────────────────

fn outage() -> StoreError {
    StoreError::Unavailable(rusqlite::Error::InvalidQuery)
}

/// Product store whose every read fails, counting attempts.
pub struct OfflineProductStore {
    pub calls: AtomicUsize,
}

impl OfflineProductStore {
    pub fn new() -> Self {
        Self { calls: AtomicUsize::new(0) }
    }

    fn fail<T>(&self) -> Result<T, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(outage())
    }
}

impl ProductStore for OfflineProductStore {
    fn fetch_candidates(&self, _query: &CandidateQuery<'_>) -> Result<Vec<Product>, StoreError> {
        self.fail()
    }
    fn fetch_by_id(&self, _id: i64) -> Result<Option<Product>, StoreError> {
        self.fail()
    }
    fn embedding_targets(&self, _force: bool) -> Result<Vec<i64>, StoreError> {
        self.fail()
    }
    fn fetch_many(&self, _ids: &[i64]) -> Result<Vec<Product>, StoreError> {
        self.fail()
    }
    fn store_embeddings(&self, _batch: &[(i64, Vec<f32>)]) -> Result<usize, StoreError> {
        self.fail()
    }
}

/// Session store whose every call fails.
pub struct OfflineSessionStore;

impl SessionStore for OfflineSessionStore {
    fn load(&self, _key: &SessionKey) -> Result<Option<Vec<Turn>>, StoreError> {
        Err(outage())
    }
    fn upsert(&self, _key: &SessionKey, _turns: &[Turn]) -> Result<(), StoreError> {
        Err(outage())
    }
    fn list(&self, _user_id: UserId, _limit: usize) -> Result<Vec<StoredSession>, StoreError> {
        Err(outage())
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────────

pub fn engine(store: Arc<dyn ProductStore>, embedder: Arc<dyn EmbeddingProvider>) -> RetrievalEngine {
    RetrievalEngine::new(store, embedder, Duration::from_secs(2), RetrievalConfig::default())
}

pub fn sqlite_engine(db: &Arc<Mutex<Connection>>, embedder: Arc<dyn EmbeddingProvider>) -> RetrievalEngine {
    engine(Arc::new(SqliteProductStore::new(Arc::clone(db))), embedder)
}

pub fn cache(db: &Arc<Mutex<Connection>>, max_cache_size: usize) -> ConversationCache {
    let config = ConversationConfig {
        max_cache_size,
        ..ConversationConfig::default()
    };
    ConversationCache::new(Arc::new(SqliteSessionStore::new(Arc::clone(db))), &config)
}

/// Raw `session_data` column for a key, or `None`.
pub fn raw_session_data(db: &Arc<Mutex<Connection>>, key: &SessionKey) -> Option<String> {
    use rusqlite::OptionalExtension;
    db.lock()
        .unwrap()
        .query_row(
            "SELECT session_data FROM chat_sessions WHERE session_id = ?1 AND user_id = ?2",
            params![key.session_id.to_string(), key.user_id.0],
            |row| row.get(0),
        )
        .optional()
        .unwrap()
}
