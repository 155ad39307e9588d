//! AI enrichment: a short marketing summary and usage tags per product.
//!
//! Every product yields an explicit [`EnrichmentOutcome`]. Only
//! [`EnrichmentOutcome::Enriched`] is ever persisted; products that fell back are
//! left untouched so a later run retries them.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::store::{ProductStore, SqliteProductStore};
use super::types::Product;
use crate::error::{PaintResult, StoreError};
use crate::llm::{complete_bounded, ChatMessage, ChatModel};

pub const MAX_TAGS: usize = 8;

const SYSTEM_PROMPT: &str = "Você é um especialista em tintas. Responda somente com JSON no formato \
{\"summary\": \"...\", \"tags\": [\"...\"]}. O resumo deve ter no máximo duas frases em português; \
as tags descrevem ambientes e usos (ex.: quarto, fachada, cozinha), de 1 a 8 itens.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EnrichmentOutcome {
    Enriched { summary: String, tags: Vec<String> },
    FallbackUsed { reason: String },
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct EnrichReport {
    pub enriched: usize,
    pub fallback: usize,
}

#[derive(Deserialize)]
struct EnrichmentPayload {
    summary: String,
    #[serde(default)]
    tags: Vec<String>,
}

/// Ask the generation model for a summary and tags for one product.
pub async fn enrich_product(
    model: &dyn ChatModel,
    product: &Product,
    timeout: Duration,
) -> EnrichmentOutcome {
    let messages = [
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(product.document_text()),
    ];
    match complete_bounded(model, &messages, timeout).await {
        Ok(raw) => parse_enrichment(&raw),
        Err(e) => EnrichmentOutcome::FallbackUsed {
            reason: e.to_string(),
        },
    }
}

/// Validate a model reply. Tolerates a fenced code block around the JSON.
pub fn parse_enrichment(raw: &str) -> EnrichmentOutcome {
    let body = strip_code_fence(raw);
    let payload: EnrichmentPayload = match serde_json::from_str(body) {
        Ok(p) => p,
        Err(e) => {
            return EnrichmentOutcome::FallbackUsed {
                reason: format!("reply is not valid enrichment JSON: {e}"),
            }
        }
    };

    let summary = payload.summary.trim().to_string();
    if summary.is_empty() {
        return EnrichmentOutcome::FallbackUsed {
            reason: "empty summary".into(),
        };
    }

    let mut tags: Vec<String> = Vec::new();
    for tag in payload.tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    if tags.is_empty() || tags.len() > MAX_TAGS {
        return EnrichmentOutcome::FallbackUsed {
            reason: format!("expected 1 to {MAX_TAGS} tags, got {}", tags.len()),
        };
    }

    EnrichmentOutcome::Enriched { summary, tags }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Enrich every product still missing a summary (all products with `force`).
pub async fn enrich_catalog(
    store: &SqliteProductStore,
    model: &dyn ChatModel,
    timeout: Duration,
    force: bool,
    mut on_product: impl FnMut(&Product, &EnrichmentOutcome),
) -> PaintResult<EnrichReport> {
    let targets = {
        let store = store.clone();
        tokio::task::spawn_blocking(move || store.enrichment_targets(force))
            .await
            .map_err(StoreError::from)??
    };
    info!(targets = targets.len(), force, "enrichment started");

    let mut report = EnrichReport::default();
    for id in targets {
        let fetched = {
            let store = store.clone();
            tokio::task::spawn_blocking(move || store.fetch_by_id(id))
                .await
                .map_err(StoreError::from)??
        };
        let Some(product) = fetched else { continue };

        let outcome = enrich_product(model, &product, timeout).await;
        match &outcome {
            EnrichmentOutcome::Enriched { summary, tags } => {
                let (store, summary, tags) = (store.clone(), summary.clone(), tags.clone());
                tokio::task::spawn_blocking(move || store.set_enrichment(id, &summary, &tags))
                    .await
                    .map_err(StoreError::from)??;
                report.enriched += 1;
            }
            EnrichmentOutcome::FallbackUsed { reason } => {
                warn!(product_id = id, reason = %reason, "enrichment fell back");
                report.fallback += 1;
            }
        }
        on_product(&product, &outcome);
    }

    info!(enriched = report.enriched, fallback = report.fallback, "enrichment finished");
    Ok(report)
}
