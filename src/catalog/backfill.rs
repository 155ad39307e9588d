//! Embedding maintenance: compute and persist vectors for catalog products.
//!
//! Work is split into fixed-size batches. Each batch is embedded with one
//! provider call and persisted in one transaction before the next batch starts,
//! so an interrupted run loses at most the batch in flight. When a batch call
//! fails, its products are retried one by one and individual failures are
//! skipped.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use super::store::ProductStore;
use super::types::Product;
use crate::embedding::{check_dimensions, embed_batch_bounded, embed_bounded, EmbeddingProvider};
use crate::error::{PaintError, PaintResult, StoreError};

#[derive(Debug, Clone)]
pub struct BackfillOptions {
    /// Re-embed every product instead of only those with no embedding.
    pub force: bool,
    pub batch_size: usize,
    pub timeout: Duration,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct BackfillReport {
    /// Products whose embedding was written.
    pub processed: usize,
    /// Products skipped after a provider failure.
    pub skipped: usize,
}

/// Compute and store embeddings. `on_batch` is called with the number of
/// products handled after every batch (for progress display).
pub async fn backfill_embeddings(
    store: Arc<dyn ProductStore>,
    provider: &dyn EmbeddingProvider,
    options: &BackfillOptions,
    mut on_batch: impl FnMut(usize),
) -> PaintResult<BackfillReport> {
    if options.batch_size == 0 {
        return Err(PaintError::validation("batch_size must be positive"));
    }

    let force = options.force;
    let targets = blocking(&store, move |s| s.embedding_targets(force)).await?;
    info!(targets = targets.len(), force, "embedding backfill started");

    let mut report = BackfillReport::default();
    for chunk in targets.chunks(options.batch_size) {
        let ids = chunk.to_vec();
        let products = blocking(&store, move |s| s.fetch_many(&ids)).await?;

        let (vectors, skipped) = embed_products(provider, &products, options.timeout).await;
        report.skipped += skipped;

        if !vectors.is_empty() {
            let written = blocking(&store, move |s| s.store_embeddings(&vectors)).await?;
            report.processed += written;
        }
        on_batch(chunk.len());
    }

    info!(
        processed = report.processed,
        skipped = report.skipped,
        "embedding backfill finished"
    );
    Ok(report)
}

/// Embed one batch. Returns the vectors that passed validation and the number of
/// products skipped.
async fn embed_products(
    provider: &dyn EmbeddingProvider,
    products: &[Product],
    timeout: Duration,
) -> (Vec<(i64, Vec<f32>)>, usize) {
    let texts: Vec<String> = products.iter().map(Product::document_text).collect();
    let expected = provider.dimensions();

    match embed_batch_bounded(provider, &texts, timeout).await {
        Ok(vectors) => {
            let mut accepted = Vec::with_capacity(vectors.len());
            let mut skipped = 0;
            for (product, vector) in products.iter().zip(vectors) {
                match check_dimensions(&vector, expected) {
                    Ok(()) => accepted.push((product.id, vector)),
                    Err(e) => {
                        warn!(product_id = product.id, error = %e, "skipping product");
                        skipped += 1;
                    }
                }
            }
            (accepted, skipped)
        }
        Err(e) => {
            warn!(error = %e, batch = products.len(), "batch embedding failed, retrying individually");
            let mut accepted = Vec::new();
            let mut skipped = 0;
            for (product, text) in products.iter().zip(&texts) {
                match embed_bounded(provider, text, timeout).await {
                    Ok(vector) => accepted.push((product.id, vector)),
                    Err(e) => {
                        warn!(product_id = product.id, error = %e, "skipping product");
                        skipped += 1;
                    }
                }
            }
            (accepted, skipped)
        }
    }
}

async fn blocking<T, F>(store: &Arc<dyn ProductStore>, op: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&dyn ProductStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(store.as_ref())).await?
}
