use anyhow::Result;

use crate::catalog::{ProductFilters, SearchRequest};
use crate::config::PaintwiseConfig;
use crate::server::Services;

/// Run a catalog search from the terminal.
pub async fn search(
    config: &PaintwiseConfig,
    query: &str,
    limit: Option<usize>,
    threshold: Option<f32>,
    filters: ProductFilters,
) -> Result<()> {
    let services = Services::open(config)?;

    let request = SearchRequest {
        query: query.to_string(),
        limit,
        threshold,
        filters,
    };
    let results = services.engine.search(&request).await?;

    if results.is_empty() {
        println!("No products found.");
        return Ok(());
    }

    println!("Found {} product(s)\n", results.len());

    for (i, result) in results.iter().enumerate() {
        let p = &result.product;
        println!(
            "  {}. #{} {} ({}, {}) score: {:.4}",
            i + 1,
            p.id,
            p.name,
            p.color,
            p.product_line,
            result.relevance_score,
        );
        println!(
            "     {} | {} | {}",
            p.environment,
            p.finish_type,
            p.price.map_or("no price".to_string(), |v| format!("R$ {v:.2}")),
        );
        if !p.features.is_empty() {
            println!("     features: {}", p.features.join(", "));
        }
        println!();
    }

    Ok(())
}
