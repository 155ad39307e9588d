mod helpers;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use helpers::*;
use paintwise::catalog::Environment;
use paintwise::config::ConversationConfig;
use paintwise::conversation::turn::FALLBACK_MESSAGE;
use paintwise::conversation::{
    run_turn, AgentReply, CatalogResponder, ConversationCache, Responder, SessionId, SessionKey,
    Turn, UserId,
};
use paintwise::error::{PaintError, PaintResult, ProviderError, StoreError};
use paintwise::llm::{ChatMessage, ChatModel};

const TURN_TIMEOUT: Duration = Duration::from_secs(2);

fn key(user: i64) -> SessionKey {
    SessionKey::new(SessionId::new(), UserId(user))
}

/// Replies with the message echoed back and remembers the history length it saw.
struct EchoResponder {
    seen_history: Mutex<Vec<usize>>,
}

impl EchoResponder {
    fn new() -> Self {
        Self { seen_history: Mutex::new(vec![]) }
    }
}

#[async_trait]
impl Responder for EchoResponder {
    async fn respond(&self, history: &[Turn], message: &str) -> PaintResult<AgentReply> {
        self.seen_history.lock().unwrap().push(history.len());
        Ok(AgentReply::Text {
            text: format!("Resposta: {message}"),
        })
    }
}

struct ProviderDown;

#[async_trait]
impl Responder for ProviderDown {
    async fn respond(&self, _history: &[Turn], _message: &str) -> PaintResult<AgentReply> {
        Err(ProviderError::Status {
            status: 500,
            body: "upstream error".into(),
        }
        .into())
    }
}

struct Stalled;

#[async_trait]
impl Responder for Stalled {
    async fn respond(&self, _history: &[Turn], _message: &str) -> PaintResult<AgentReply> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(AgentReply::Text { text: "tarde demais".into() })
    }
}

struct CatalogDown;

#[async_trait]
impl Responder for CatalogDown {
    async fn respond(&self, _history: &[Turn], _message: &str) -> PaintResult<AgentReply> {
        Err(StoreError::Poisoned.into())
    }
}

// ── Cache and store ───────────────────────────────────────────────────────────

#[tokio::test]
async fn saved_history_survives_a_new_cache() {
    let db = test_db();
    let k = key(7);

    let first = cache(&db, 100);
    let memory = first.get_memory(&k).await.unwrap();
    memory.add_human("Oi");
    first.save(&k, &memory).await.unwrap();

    let second = cache(&db, 100);
    let restored = second.get_memory(&k).await.unwrap();
    assert_eq!(restored.snapshot(), vec![Turn::human("Oi")]);
}

#[tokio::test]
async fn session_data_column_format() {
    let db = test_db();
    let k = key(1);
    let c = cache(&db, 10);
    let memory = c.get_memory(&k).await.unwrap();
    memory.add_human("Oi");
    memory.add_assistant("Olá!");
    c.save(&k, &memory).await.unwrap();

    let raw: serde_json::Value = serde_json::from_str(&raw_session_data(&db, &k).unwrap()).unwrap();
    assert_eq!(
        raw,
        serde_json::json!({
            "messages": [
                {"type": "human", "content": "Oi"},
                {"type": "ai", "content": "Olá!"}
            ],
            "message_count": 2
        })
    );
}

#[tokio::test]
async fn repeated_save_is_idempotent() {
    let db = test_db();
    let k = key(1);
    {
        let writer = cache(&db, 10);
        let memory = writer.get_memory(&k).await.unwrap();
        memory.add_human("Quero tinta azul");
        memory.add_assistant("Temos o Suvinil Azul Sereno.");
        writer.save(&k, &memory).await.unwrap();
    }
    let original = raw_session_data(&db, &k).unwrap();

    let fresh = cache(&db, 10);
    let memory = fresh.get_memory(&k).await.unwrap();
    assert_eq!(memory.snapshot().len(), 2);
    for _ in 0..2 {
        fresh.save(&k, &memory).await.unwrap();
        assert_eq!(raw_session_data(&db, &k).unwrap(), original);
    }

    let count: i64 = db
        .lock()
        .unwrap()
        .query_row("SELECT COUNT(*) FROM chat_sessions", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn cleanup_enforces_capacity() {
    let db = test_db();
    let c = cache(&db, 3);
    let keys: Vec<SessionKey> = (0..4).map(key).collect();
    for k in &keys {
        c.get_memory(k).await.unwrap();
    }
    assert_eq!(c.len(), 4);

    assert_eq!(c.cleanup(), 1);
    assert_eq!(c.len(), 3);
    assert!(!c.contains(&keys[0]));
    assert!(keys[1..].iter().all(|k| c.contains(k)));
}

#[tokio::test]
async fn sessions_are_isolated_per_user() {
    let db = test_db();
    let c = cache(&db, 10);
    let mine = key(1);
    let memory = c.get_memory(&mine).await.unwrap();
    memory.add_human("segredo");
    c.save(&mine, &memory).await.unwrap();

    let theirs = SessionKey::new(mine.session_id, UserId(2));
    assert!(c.history(&theirs).await.unwrap().is_none());

    let fresh = cache(&db, 10);
    let other = fresh.get_memory(&theirs).await.unwrap();
    assert!(other.is_empty());
    assert!(fresh.list_sessions(UserId(2), None).await.unwrap().is_empty());
}

#[tokio::test]
async fn list_sessions_is_read_only() {
    let db = test_db();
    let writer = cache(&db, 10);
    let k = key(5);
    let memory = writer.get_memory(&k).await.unwrap();
    memory.add_human("Preciso de tinta para banheiro com antimofo");
    memory.add_assistant("Recomendo a linha Premium.");
    writer.save(&k, &memory).await.unwrap();

    let reader = ConversationCache::new(
        Arc::new(paintwise::conversation::SqliteSessionStore::new(db.clone())),
        &ConversationConfig {
            preview_chars: 10,
            ..ConversationConfig::default()
        },
    );
    let sessions = reader.list_sessions(UserId(5), None).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_id, k.session_id);
    assert_eq!(sessions[0].message_count, 2);
    assert_eq!(sessions[0].preview, "Preciso de...");
    assert!(!sessions[0].active);
    assert!(reader.is_empty());

    let sessions = writer.list_sessions(UserId(5), Some(5)).await.unwrap();
    assert!(sessions[0].active);
}

#[tokio::test]
async fn list_sessions_orders_by_activity_and_limits() {
    let db = test_db();
    let c = cache(&db, 10);
    let older = c.create_session(UserId(3)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let newer = c.create_session(UserId(3)).await.unwrap();

    let sessions = c.list_sessions(UserId(3), None).await.unwrap();
    let ids: Vec<SessionId> = sessions.iter().map(|s| s.session_id).collect();
    assert_eq!(ids, vec![newer, older]);
    assert_eq!(sessions[0].preview, paintwise::conversation::types::NO_MESSAGES_PREVIEW);

    // Activity on the older session moves it to the front.
    tokio::time::sleep(Duration::from_millis(5)).await;
    let k = SessionKey::new(older, UserId(3));
    let memory = c.get_memory(&k).await.unwrap();
    memory.add_human("Oi");
    c.save(&k, &memory).await.unwrap();

    assert_eq!(c.latest_session(UserId(3)).await.unwrap(), Some(older));
    assert_eq!(c.list_sessions(UserId(3), Some(1)).await.unwrap().len(), 1);
    assert!(matches!(
        c.list_sessions(UserId(3), Some(0)).await.unwrap_err(),
        PaintError::Validation(_)
    ));
    assert_eq!(c.latest_session(UserId(99)).await.unwrap(), None);
}

#[tokio::test]
async fn reset_keeps_persisted_history() {
    let db = test_db();
    let c = cache(&db, 10);
    let k = key(4);
    let memory = c.get_memory(&k).await.unwrap();
    memory.add_human("Oi");
    c.save(&k, &memory).await.unwrap();

    assert!(c.reset(&k));
    assert!(!c.reset(&k));
    assert!(!c.contains(&k));
    assert!(raw_session_data(&db, &k).is_some());

    let reloaded = c.get_memory(&k).await.unwrap();
    assert_eq!(reloaded.len(), 1);
}

#[test]
fn malformed_session_id_is_validation_error() {
    for raw in ["", "abc", "1234", "not-a-uuid-at-all-0000000000000000"] {
        assert!(matches!(SessionId::parse(raw), Err(PaintError::Validation(_))));
    }
    let id = SessionId::new();
    assert_eq!(SessionId::parse(&id.to_string()).unwrap(), id);
}

#[tokio::test]
async fn store_outage_surfaces_from_cache() {
    let c = ConversationCache::new(Arc::new(OfflineSessionStore), &ConversationConfig::default());
    let k = key(1);

    assert!(matches!(
        c.get_memory(&k).await.unwrap_err(),
        PaintError::StoreUnavailable(_)
    ));
    assert!(matches!(
        c.list_sessions(UserId(1), None).await.unwrap_err(),
        PaintError::StoreUnavailable(_)
    ));
    assert!(c.is_empty());
}

// ── Turns ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn turn_appends_and_persists_both_messages() {
    let db = test_db();
    let c = cache(&db, 10);
    let k = key(9);
    let responder = EchoResponder::new();

    let outcome = run_turn(&c, &responder, &k, "Oi", TURN_TIMEOUT).await.unwrap();
    assert!(!outcome.fallback);
    assert_eq!(outcome.reply.text(), "Resposta: Oi");

    run_turn(&c, &responder, &k, "Tinta azul", TURN_TIMEOUT).await.unwrap();
    assert_eq!(*responder.seen_history.lock().unwrap(), vec![0, 2]);

    let persisted = cache(&db, 10).history(&k).await.unwrap().unwrap();
    assert_eq!(
        persisted,
        vec![
            Turn::human("Oi"),
            Turn::assistant("Resposta: Oi"),
            Turn::human("Tinta azul"),
            Turn::assistant("Resposta: Tinta azul"),
        ]
    );
}

#[tokio::test]
async fn provider_failure_returns_fallback_without_saving() {
    let db = test_db();
    let c = cache(&db, 10);
    let k = key(2);

    let outcome = run_turn(&c, &ProviderDown, &k, "Oi", TURN_TIMEOUT).await.unwrap();
    assert!(outcome.fallback);
    assert_eq!(outcome.reply.text(), FALLBACK_MESSAGE);
    assert!(raw_session_data(&db, &k).is_none());
    assert!(c.get_memory(&k).await.unwrap().is_empty());
}

#[tokio::test]
async fn slow_responder_times_out_into_fallback() {
    let db = test_db();
    let c = cache(&db, 10);
    let k = key(2);

    let outcome = run_turn(&c, &Stalled, &k, "Oi", Duration::from_millis(50))
        .await
        .unwrap();
    assert!(outcome.fallback);
    assert!(raw_session_data(&db, &k).is_none());
}

#[tokio::test]
async fn non_provider_errors_abort_the_turn() {
    let db = test_db();
    let c = cache(&db, 10);
    let err = run_turn(&c, &CatalogDown, &key(1), "Oi", TURN_TIMEOUT)
        .await
        .unwrap_err();
    assert!(matches!(err, PaintError::StoreUnavailable(_)));
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let db = test_db();
    let c = cache(&db, 10);
    let responder = EchoResponder::new();
    let err = run_turn(&c, &responder, &key(1), "   ", TURN_TIMEOUT)
        .await
        .unwrap_err();
    assert!(matches!(err, PaintError::Validation(_)));
    assert!(responder.seen_history.lock().unwrap().is_empty());
    assert!(c.is_empty());
}

#[tokio::test]
async fn turn_runs_cleanup() {
    let db = test_db();
    let c = cache(&db, 2);
    let responder = EchoResponder::new();
    for user in 0..4 {
        run_turn(&c, &responder, &key(user), "Oi", TURN_TIMEOUT).await.unwrap();
    }
    assert_eq!(c.len(), 2);
}

/// Records the prompt it was given and answers with a canned reply.
struct RecordingModel {
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

#[async_trait]
impl ChatModel for RecordingModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        Ok("Recomendo a Suvinil Cozinha & Banheiro.".into())
    }
}

#[tokio::test]
async fn catalog_responder_grounds_prompt_on_matches() {
    let db = test_db();
    let query = "tinta para cozinha";
    seed(
        &db,
        paint("Suvinil Cozinha & Banheiro", Environment::Internal, &["lavável"]),
        Some(spike(0)),
    );
    let engine = Arc::new(sqlite_engine(
        &db,
        Arc::new(ScriptedEmbedder::new().with(query, spike(0))),
    ));
    let model = Arc::new(RecordingModel { prompts: Mutex::new(vec![]) });
    let responder = CatalogResponder::new(engine, model.clone());

    let c = cache(&db, 10);
    let k = key(1);
    let outcome = run_turn(&c, &responder, &k, query, TURN_TIMEOUT).await.unwrap();
    assert!(!outcome.fallback);
    assert_eq!(outcome.reply.text(), "Recomendo a Suvinil Cozinha & Banheiro.");

    let prompts = model.prompts.lock().unwrap();
    let prompt = &prompts[0];
    assert_eq!(prompt[0].role, "system");
    assert!(prompt[0].content.contains("Nome: Suvinil Cozinha & Banheiro"));
    assert_eq!(prompt.last().unwrap(), &ChatMessage::user(query));
}
