//! CLI `backfill` command: compute embeddings for products that lack one.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

use crate::catalog::backfill::{backfill_embeddings, BackfillOptions, BackfillReport};
use crate::catalog::ProductStore;
use crate::config::PaintwiseConfig;
use crate::db;
use crate::embedding;

/// Embed missing products, or every product with `force`.
pub async fn backfill(config: &PaintwiseConfig, force: bool) -> Result<()> {
    let services = crate::server::Services::open(config)?;

    let provider = embedding::create_provider(&config.embedding)
        .context("failed to create embedding provider")?;

    let store: Arc<dyn ProductStore> = Arc::new(services.products.clone());
    let total = {
        let store = Arc::clone(&store);
        tokio::task::spawn_blocking(move || store.embedding_targets(force)).await??.len()
    };
    if total == 0 {
        println!("All products already have embeddings.");
        return Ok(());
    }

    println!(
        "Embedding {total} products with model '{}'...",
        config.embedding.model
    );

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} ({eta})")
            .expect("valid template")
            .progress_chars("##-"),
    );

    let options = BackfillOptions {
        force,
        batch_size: config.embedding.batch_size,
        timeout: config.embedding.timeout(),
    };
    let report = backfill_embeddings(store, provider.as_ref(), &options, |n| pb.inc(n as u64)).await?;

    pb.finish_and_clear();

    {
        let conn = services
            .db
            .lock()
            .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
        let stored = db::meta::get_embedding_model(&conn)?;
        if should_record_model(stored.as_deref(), force, &report) {
            db::meta::set_embedding_model(&conn, &config.embedding.model)?;
            tracing::info!(model = %config.embedding.model, "recorded embedding model");
        }
    }

    println!("Embedded {} products.", report.processed);
    if report.skipped > 0 {
        println!(
            "Skipped {} products after provider errors; run `paintwise backfill{}` again to retry.",
            report.skipped,
            if force { " --force" } else { "" }
        );
    }
    Ok(())
}

/// The first vectors written fix the model. After that only a complete
/// `--force` rebuild may replace it, since a partial one leaves mixed vectors.
fn should_record_model(stored: Option<&str>, force: bool, report: &BackfillReport) -> bool {
    if report.processed == 0 {
        return false;
    }
    match stored {
        None => true,
        Some(_) => force && report.skipped == 0,
    }
}
