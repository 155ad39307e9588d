//! One conversational turn: load history, ask the responder, persist the exchange.
//!
//! The human and assistant turns are appended and saved together only once the
//! reply is known. A responder failure or timeout leaves the history untouched
//! and yields a scripted next-step message instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use super::cache::ConversationCache;
use super::types::{Role, SessionKey, Turn};
use crate::catalog::{RetrievalEngine, RetrievalResult, SearchRequest};
use crate::error::{PaintError, PaintResult, ProviderError};
use crate::llm::{ChatMessage, ChatModel};

/// Shown when the reply could not be produced. Suggests narrower follow-ups.
pub const FALLBACK_MESSAGE: &str = "Não consegui concluir sua consulta agora. \
Vou te ajudar de forma mais direta:\n\n\
• Para recomendações gerais: 'Quero tinta azul para sala'\n\
• Para características específicas: 'Preciso tinta lavável para cozinha'\n\n\
Qual dessas opções se encaixa melhor no que você precisa?";

/// What the assistant produced for a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentReply {
    Text { text: String },
    TextWithImage { text: String, image_base64: String },
}

impl AgentReply {
    pub fn text(&self) -> &str {
        match self {
            Self::Text { text } | Self::TextWithImage { text, .. } => text,
        }
    }
}

/// Produces the assistant reply for a message given the prior history.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Only `PaintError::Provider` is treated as a recoverable failure; any
    /// other error aborts the turn.
    async fn respond(&self, history: &[Turn], message: &str) -> PaintResult<AgentReply>;
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub reply: AgentReply,
    /// `true` when `reply` is the scripted fallback and nothing was persisted.
    pub fallback: bool,
}

pub async fn run_turn(
    cache: &ConversationCache,
    responder: &dyn Responder,
    key: &SessionKey,
    message: &str,
    timeout: Duration,
) -> PaintResult<TurnOutcome> {
    if message.trim().is_empty() {
        return Err(PaintError::validation("message must not be empty"));
    }

    let memory = cache.get_memory(key).await?;
    let history = memory.snapshot();

    let reply = match tokio::time::timeout(timeout, responder.respond(&history, message)).await {
        Ok(Ok(reply)) => reply,
        Ok(Err(PaintError::Provider(e))) => return Ok(fallback(key, &e)),
        Ok(Err(other)) => return Err(other),
        Err(_) => return Ok(fallback(key, &ProviderError::Timeout(timeout))),
    };

    memory.add_human(message);
    memory.add_assistant(reply.text());
    cache.save(key, &memory).await?;
    cache.cleanup();

    info!(session = %key.session_id, turns = memory.len(), "turn completed");
    Ok(TurnOutcome {
        reply,
        fallback: false,
    })
}

fn fallback(key: &SessionKey, error: &ProviderError) -> TurnOutcome {
    warn!(session = %key.session_id, error = %error, "responder failed, sending fallback reply");
    TurnOutcome {
        reply: AgentReply::Text {
            text: FALLBACK_MESSAGE.to_string(),
        },
        fallback: true,
    }
}

const ASSISTANT_PROMPT: &str = "Você é um assistente de recomendação de tintas Suvinil. \
Ajude o cliente a encontrar a tinta ideal para o projeto dele, considerando ambiente, \
superfície, acabamento e características como lavável ou antimofo. Responda em português, \
recomende produtos específicos com preço quando possível e explique o motivo da recomendação. \
Use apenas os produtos listados abaixo; se nenhum servir, faça uma pergunta para esclarecer a necessidade.";

/// Grounds the generation model on the top catalog matches for the message.
pub struct CatalogResponder {
    engine: Arc<RetrievalEngine>,
    model: Arc<dyn ChatModel>,
    context_limit: usize,
}

impl CatalogResponder {
    pub fn new(engine: Arc<RetrievalEngine>, model: Arc<dyn ChatModel>) -> Self {
        Self {
            engine,
            model,
            context_limit: 5,
        }
    }
}

#[async_trait]
impl Responder for CatalogResponder {
    async fn respond(&self, history: &[Turn], message: &str) -> PaintResult<AgentReply> {
        let matches = self
            .engine
            .search(&SearchRequest {
                query: message.to_string(),
                limit: Some(self.context_limit),
                ..Default::default()
            })
            .await?;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(format!(
            "{ASSISTANT_PROMPT}\n\n{}",
            format_products(&matches)
        )));
        messages.extend(history.iter().map(|turn| match turn.role {
            Role::Human => ChatMessage::user(turn.content.clone()),
            Role::Assistant => ChatMessage::assistant(turn.content.clone()),
        }));
        messages.push(ChatMessage::user(message));

        let text = self.model.complete(&messages).await?;
        Ok(AgentReply::Text { text })
    }
}

/// Product context block for the system prompt.
pub fn format_products(results: &[RetrievalResult]) -> String {
    if results.is_empty() {
        return "Nenhum produto encontrado para essa consulta.".to_string();
    }
    let blocks: Vec<String> = results
        .iter()
        .map(|r| {
            let p = &r.product;
            format!(
                "ID: {}\nNome: {}\nCor: {}\nLinha: {}\nAmbiente: {}\nAcabamento: {}\nPreço: {}\n\
                 Características: {}\nSuperfícies: {}\nResumo: {}\nScore de relevância: {:.2}",
                p.id,
                p.name,
                p.color,
                p.product_line,
                p.environment,
                p.finish_type,
                p.price.map_or("N/A".to_string(), |v| format!("R$ {v:.2}")),
                p.features.join(", "),
                p.surface_types.join(", "),
                p.ai_summary.as_deref().unwrap_or("N/A"),
                r.relevance_score,
            )
        })
        .collect();
    format!(
        "Encontrados {} produtos:\n\n{}",
        results.len(),
        blocks.join("\n---\n")
    )
}
