//! Hybrid retrieval over the paint catalog.
//!
//! [`RetrievalEngine::search`] picks one of four modes from its inputs (see
//! [`SearchMode`]). Ranked modes embed the query once, score every embedded
//! candidate by cosine similarity, apply the relevance threshold, then sort and
//! truncate. Unranked modes are a plain store query with a uniform score of 1.0
//! and never touch the embedding provider.
//!
//! Provider failures degrade to an empty result; store failures propagate as
//! [`PaintError::StoreUnavailable`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::store::{CandidateQuery, ProductStore};
use super::types::{Product, ProductFilters, RetrievalResult, SearchMode};
use crate::config::RetrievalConfig;
use crate::embedding::{cosine_similarity, embed_bounded, EmbeddingProvider};
use crate::error::{PaintError, PaintResult, StoreError};

/// One search call. `None` fields fall back to the engine's configured defaults.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<usize>,
    pub threshold: Option<f32>,
    pub filters: ProductFilters,
}

impl SearchRequest {
    pub fn semantic(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn filtered(filters: ProductFilters) -> Self {
        Self {
            filters,
            ..Default::default()
        }
    }
}

pub struct RetrievalEngine {
    store: Arc<dyn ProductStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    embed_timeout: Duration,
    defaults: RetrievalConfig,
}

impl RetrievalEngine {
    pub fn new(
        store: Arc<dyn ProductStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        embed_timeout: Duration,
        defaults: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            embed_timeout,
            defaults,
        }
    }

    /// Run a search. See the module docs for mode semantics.
    pub async fn search(&self, request: &SearchRequest) -> PaintResult<Vec<RetrievalResult>> {
        let limit = request.limit.unwrap_or(self.defaults.default_limit);
        let threshold = request.threshold.unwrap_or(self.defaults.default_threshold);
        self.validate(limit, threshold, &request.filters)?;

        let mode = SearchMode::select(&request.query, &request.filters);
        debug!(
            mode = %mode,
            limit,
            threshold,
            filters = ?request.filters.describe(),
            "search"
        );

        if !mode.is_ranked() {
            return self.unranked(mode, &request.filters, limit).await;
        }

        let query_vector =
            match embed_bounded(self.embedder.as_ref(), request.query.trim(), self.embed_timeout).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, mode = %mode, "query embedding failed, returning no results");
                    return Ok(vec![]);
                }
            };

        let filters = (mode == SearchMode::Hybrid).then(|| request.filters.clone());
        let candidates = self
            .fetch(move |store| {
                store.fetch_candidates(&CandidateQuery {
                    filters: filters.as_ref(),
                    embedded_only: true,
                    limit: None,
                })
            })
            .await?;

        let results = rank(&query_vector, candidates, threshold, limit);
        debug!(mode = %mode, returned = results.len(), "search complete");
        Ok(results)
    }

    /// Look up a single product. Unknown ids are `Ok(None)`.
    pub async fn get_product(&self, id: i64) -> PaintResult<Option<Product>> {
        let product = self.fetch(move |store| store.fetch_by_id(id)).await?;
        Ok(product.map(|mut p| {
            p.embedding = None;
            p
        }))
    }

    fn validate(&self, limit: usize, threshold: f32, filters: &ProductFilters) -> PaintResult<()> {
        if limit == 0 || limit > self.defaults.max_limit {
            return Err(PaintError::validation(format!(
                "limit must be between 1 and {}",
                self.defaults.max_limit
            )));
        }
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(PaintError::validation(
                "relevance threshold must be between 0.0 and 1.0",
            ));
        }
        filters.validate().map_err(PaintError::Validation)
    }

    async fn unranked(
        &self,
        mode: SearchMode,
        filters: &ProductFilters,
        limit: usize,
    ) -> PaintResult<Vec<RetrievalResult>> {
        let filters = (mode == SearchMode::Filter).then(|| filters.clone());
        let products = self
            .fetch(move |store| {
                store.fetch_candidates(&CandidateQuery {
                    filters: filters.as_ref(),
                    embedded_only: false,
                    limit: Some(limit),
                })
            })
            .await?;

        debug!(mode = %mode, returned = products.len(), "search complete");
        Ok(products
            .into_iter()
            .map(|mut product| {
                product.embedding = None;
                RetrievalResult {
                    product,
                    relevance_score: 1.0,
                }
            })
            .collect())
    }

    /// Run a store read off the async executor.
    async fn fetch<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ProductStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref())).await?
    }
}

/// Score, threshold, sort (descending score, ascending id) and truncate.
fn rank(
    query: &[f32],
    candidates: Vec<Product>,
    threshold: f32,
    limit: usize,
) -> Vec<RetrievalResult> {
    let mut scored: Vec<RetrievalResult> = candidates
        .into_iter()
        .filter_map(|mut product| {
            let embedding = product.embedding.take()?;
            let Some(similarity) = cosine_similarity(query, &embedding) else {
                warn!(
                    product_id = product.id,
                    dimensions = embedding.len(),
                    "stored embedding is not comparable with the query, skipping"
                );
                return None;
            };
            let relevance_score = similarity.clamp(0.0, 1.0);
            (relevance_score >= threshold).then_some(RetrievalResult {
                product,
                relevance_score,
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.relevance_score
            .total_cmp(&a.relevance_score)
            .then(a.product.id.cmp(&b.product.id))
    });
    scored.truncate(limit);
    scored
}
