//! CLI `enrich` command: generate AI summaries and usage tags.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::catalog::enrich::{enrich_catalog, EnrichmentOutcome};
use crate::config::PaintwiseConfig;
use crate::llm::OpenAiChat;

pub async fn enrich(config: &PaintwiseConfig, force: bool) -> Result<()> {
    let services = crate::server::Services::open(config)?;
    let model = OpenAiChat::new(&config.generation).context("failed to create generation client")?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner} {pos} products {msg}")
            .expect("valid template"),
    );

    let report = enrich_catalog(
        &services.products,
        &model,
        config.generation.timeout(),
        force,
        |product, outcome| {
            pb.inc(1);
            if let EnrichmentOutcome::FallbackUsed { reason } = outcome {
                pb.println(format!("  #{} {}: fallback ({reason})", product.id, product.name));
            }
        },
    )
    .await?;

    pb.finish_and_clear();

    println!("Enriched {} products.", report.enriched);
    if report.fallback > 0 {
        println!(
            "{} products could not be enriched and were left unchanged; run `paintwise enrich` again to retry.",
            report.fallback
        );
    }
    if report.enriched > 0 {
        println!("Summaries feed the embedding text; run `paintwise backfill --force` to refresh vectors.");
    }
    Ok(())
}
